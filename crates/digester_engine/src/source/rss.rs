use digester_core::Article;
use digester_logging::digester_debug;
use feed_rs::model::Entry;
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::source::{fetch_linked_page, Source, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssConfig {
    pub name: String,
    pub url: String,
    pub max_articles: usize,
    /// Replace feed text with the linked page.
    pub fetch_full_articles: bool,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            name: "rss".to_string(),
            url: String::new(),
            max_articles: 15,
            fetch_full_articles: false,
        }
    }
}

/// RSS 2.0 / Atom / JSON Feed source.
#[derive(Debug, Clone)]
pub struct RssSource {
    config: RssConfig,
}

impl RssSource {
    pub fn new(config: RssConfig) -> Result<Self, SourceError> {
        if config.url.trim().is_empty() {
            return Err(SourceError::InvalidConfig(
                "rss source requires a url".to_string(),
            ));
        }
        if config.max_articles == 0 {
            return Err(SourceError::InvalidConfig(
                "max_articles must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RssConfig {
        &self.config
    }

    fn to_article(&self, entry: Entry) -> Option<Article> {
        let content = entry.content.and_then(|c| c.body).unwrap_or_default();
        let description = entry.summary.map(|s| s.content).unwrap_or_default();
        if content.is_empty() && description.is_empty() {
            return None;
        }
        let (content, summary) = if content.is_empty() {
            (description, String::new())
        } else {
            (content, description)
        };

        Some(Article {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            author: entry
                .authors
                .into_iter()
                .next()
                .map(|p| p.name)
                .unwrap_or_default(),
            published_at: entry.published.or(entry.updated),
            url: entry
                .links
                .into_iter()
                .next()
                .map(|l| l.href)
                .unwrap_or_default(),
            content,
            summary,
            source_name: self.config.name.clone(),
            tags: entry.categories.into_iter().map(|c| c.term).collect(),
            ..Article::default()
        })
    }
}

#[async_trait::async_trait]
impl Source for RssSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        cancel: &CancellationToken,
    ) -> Result<Vec<Article>, SourceError> {
        let url = self.config.url.as_str();
        let output = fetcher
            .fetch(url, cancel)
            .await
            .map_err(|err| SourceError::fetch(url, err))?;
        let feed = feed_rs::parser::parse(output.bytes.as_slice()).map_err(|err| {
            SourceError::Parse {
                what: format!("feed {url}"),
                message: err.to_string(),
            }
        })?;
        digester_debug!("feed {} has {} entries", url, feed.entries.len());

        let mut articles = Vec::new();
        for entry in feed.entries {
            if articles.len() >= self.config.max_articles {
                break;
            }
            let Some(mut article) = self.to_article(entry) else {
                continue;
            };
            if self.config.fetch_full_articles && !article.url.is_empty() {
                if let Some(page) = fetch_linked_page(fetcher, &article.url, cancel).await? {
                    article.content = page;
                }
            }
            articles.push(article);
        }
        Ok(articles)
    }
}
