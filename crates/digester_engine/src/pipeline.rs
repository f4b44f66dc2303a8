use chrono::Utc;
use digester_core::{dedup_by_url, filter_by_denylist, sort_articles, Article, Digest, SortField};
use digester_logging::{digester_info, digester_warn};
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::process::{ProcessOptions, Processor};
use crate::source::Source;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("run cancelled")]
    Cancelled,
    #[error("no sources configured")]
    NoSources,
}

pub struct SourceEntry {
    pub source: Box<dyn Source>,
    /// Case-insensitive words that drop an article from this source.
    pub denylist: Vec<String>,
}

impl SourceEntry {
    pub fn new(source: Box<dyn Source>) -> Self {
        Self {
            source,
            denylist: Vec::new(),
        }
    }

    pub fn with_denylist(mut self, denylist: Vec<String>) -> Self {
        self.denylist = denylist;
        self
    }
}

/// Fetch, process and assemble articles from every source into one digest.
///
/// Sources run one after another in configuration order. A failing source
/// or article is logged and skipped; only cancellation ends the run early.
pub struct DigestPipeline {
    pub sources: Vec<SourceEntry>,
    pub processors: Vec<Box<dyn Processor>>,
    pub process_options: ProcessOptions,
    pub sort_fields: Vec<SortField>,
}

impl DigestPipeline {
    pub fn new(sources: Vec<SourceEntry>) -> Self {
        Self {
            sources,
            processors: Vec::new(),
            process_options: ProcessOptions::default(),
            sort_fields: Vec::new(),
        }
    }

    pub async fn run(
        &self,
        fetcher: &dyn Fetcher,
        title: &str,
        cancel: &CancellationToken,
    ) -> Result<Digest, PipelineError> {
        if self.sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let mut collected = Vec::new();
        for entry in &self.sources {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let name = entry.source.name();
            let fetched = match entry.source.fetch(fetcher, cancel).await {
                Ok(articles) => articles,
                Err(err) if err.is_cancelled() => return Err(PipelineError::Cancelled),
                Err(err) => {
                    digester_warn!("source {} failed: {}", name, err);
                    continue;
                }
            };
            let fetched_count = fetched.len();

            let processed = self.process_all(name, fetched);
            let kept = filter_by_denylist(processed, &entry.denylist);
            digester_info!(
                "source {}: {} fetched, {} kept",
                name,
                fetched_count,
                kept.len()
            );
            collected.extend(kept);
        }

        let mut articles = dedup_by_url(collected);
        sort_articles(&mut articles, &self.sort_fields);

        let mut digest = Digest::new(title, Utc::now());
        digest.articles = articles;
        Ok(digest)
    }

    fn process_all(&self, source: &str, articles: Vec<Article>) -> Vec<Article> {
        articles
            .into_iter()
            .filter_map(|mut article| {
                for processor in &self.processors {
                    if let Err(err) = processor.process(&mut article, &self.process_options) {
                        if err.is_content_processing_failed() {
                            digester_info!(
                                "skipping {} from {}: {}",
                                article.url,
                                source,
                                err
                            );
                        } else {
                            digester_warn!(
                                "{} failed on {} from {}: {}",
                                processor.name(),
                                article.url,
                                source,
                                err
                            );
                        }
                        return None;
                    }
                }
                Some(article)
            })
            .collect()
    }
}

