//! Content sources that turn a remote listing into articles.
mod hackernews;
mod rss;

use digester_core::Article;
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::types::FetchError;

pub use hackernews::{HackerNewsConfig, HackerNewsPage, HackerNewsSource};
pub use rss::{RssConfig, RssSource};

/// Source type names accepted in configuration.
pub const AVAILABLE_SOURCES: &[&str] = &["hackernews", "rss"];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("parsing {what}: {message}")]
    Parse { what: String, message: String },
    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),
}

impl SourceError {
    pub(crate) fn fetch(url: &str, source: FetchError) -> Self {
        SourceError::Fetch {
            url: url.to_string(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceError::Fetch { source, .. } if source.is_cancelled())
    }
}

#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Label stamped on every article as `source_name`.
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        cancel: &CancellationToken,
    ) -> Result<Vec<Article>, SourceError>;
}

/// Fetch a linked page to replace source-provided text. `Ok(None)` means
/// keep what the source gave: the fetch failed or the page was blank.
/// Only cancellation is an error.
pub(crate) async fn fetch_linked_page(
    fetcher: &dyn Fetcher,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>, SourceError> {
    match fetcher.fetch_as_string(url, cancel).await {
        Ok(body) if body.trim().is_empty() => Ok(None),
        Ok(body) => Ok(Some(body)),
        Err(err) if err.is_cancelled() => Err(SourceError::fetch(url, err)),
        Err(err) => {
            digester_logging::digester_warn!(
                "error fetching linked page {}: {}; keeping source text",
                url,
                err
            );
            Ok(None)
        }
    }
}
