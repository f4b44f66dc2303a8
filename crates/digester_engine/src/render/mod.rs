//! Digest renderers: Markdown document and EPUB package.
mod assets;
mod epub;
mod images;
mod markdown;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use digester_core::Digest;
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;

pub use assets::{AssetError, AssetStore, PackagedAsset};
pub use epub::EpubRenderer;
pub use images::{collect_image_sources, resolve_image_url, rewrite_image_sources, ImageUrlError};
pub use markdown::{Converter, Html2MdConverter, MarkdownRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Epub,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Epub => "epub",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "epub" => Ok(OutputFormat::Epub),
            other => Err(format!("unsupported format: {other}")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Epub => write!(f, "epub"),
        }
    }
}

#[derive(Clone)]
pub struct RenderOptions {
    pub include_summary: bool,
    pub include_metadata: bool,
    /// Download `<img>` sources into the package. EPUB only; needs `fetcher`.
    pub store_images: bool,
    pub fetcher: Option<Arc<dyn Fetcher>>,
    pub cancel: CancellationToken,
    /// Parent of the image scratch directory; the system temp dir if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_summary: true,
            include_metadata: false,
            store_images: false,
            fetcher: None,
            cancel: CancellationToken::new(),
            scratch_dir: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("include_summary", &self.include_summary)
            .field("include_metadata", &self.include_metadata)
            .field("store_images", &self.store_images)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<fetcher>"))
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("store_images is enabled but no fetcher was provided")]
    MissingFetcher,
    /// Index 0 is the table of contents, N is article N.
    #[error("error adding section {index}: {message}")]
    Section { index: usize, message: String },
    #[error("error packaging epub: {0}")]
    Package(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("render cancelled")]
    Cancelled,
}

#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        digest: &Digest,
        options: &RenderOptions,
        writer: &mut (dyn Write + Send),
    ) -> Result<(), RenderError>;
}

pub fn renderer_for(format: OutputFormat) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Markdown => Box::new(MarkdownRenderer::default()),
        OutputFormat::Epub => Box::new(EpubRenderer),
    }
}

/// RFC 1123 style, e.g. `Mon, 02 Jan 2006 15:04:05 UTC`.
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S UTC").to_string()
}
