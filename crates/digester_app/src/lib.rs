//! Digester application: configuration, output handling and the run loop
//! behind the `digester` binary.
pub mod config;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use digester_engine::{
    processors_from_names, renderer_for, DigestPipeline, FetchError, Fetcher, LimitedFetcher,
    PipelineError, ProcessError, RenderError, RenderOptions, ReqwestFetcher,
};
use digester_logging::{digester_info, digester_warn};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigError};
use crate::output::{OutputError, OutputFile};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot build http client: {0}")]
    Client(#[from] FetchError),
    #[error(transparent)]
    Processor(#[from] ProcessError),
    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("cannot write output: {0}")]
    Output(#[from] OutputError),
}

/// Build the fetch stack, run every source, render the digest and move it
/// into place. Returns the written path.
pub async fn run(config: &Config, cancel: &CancellationToken) -> Result<PathBuf, RunError> {
    let client = ReqwestFetcher::new(config.fetch_settings())?;
    let interval = config.rate_limit();
    let fetcher: Arc<dyn Fetcher> = if interval.is_zero() {
        Arc::new(client)
    } else {
        Arc::new(LimitedFetcher::new(client, interval))
    };

    let mut pipeline = DigestPipeline::new(config.build_sources()?);
    pipeline.processors = processors_from_names(&config.processing.processors)?;
    pipeline.process_options = config.process_options();
    pipeline.sort_fields = config.sort_fields()?;

    let digest = pipeline
        .run(fetcher.as_ref(), &config.digest.title, cancel)
        .await?;
    if digest.articles.is_empty() {
        digester_warn!("digest {:?} has no articles", digest.title);
    } else {
        digester_info!("digest {:?} has {} articles", digest.title, digest.articles.len());
    }

    let format = config.output_format();
    let options = RenderOptions {
        include_summary: config.formatting.include_summary,
        include_metadata: config.formatting.include_metadata,
        store_images: config.formatting.store_images,
        fetcher: Some(fetcher.clone()),
        cancel: cancel.clone(),
        ..RenderOptions::default()
    };
    let mut output = OutputFile::create(&config.digest.output_path)?;
    renderer_for(format)
        .render(&digest, &options, output.writer())
        .await?;
    let path = output.commit()?;
    digester_info!("wrote {} digest to {}", format, path.display());
    Ok(path)
}
