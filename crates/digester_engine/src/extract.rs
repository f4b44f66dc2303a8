use dom_smoothie::{Config, Readability};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub content_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("readability extraction failed: {0}")]
pub struct ExtractError(pub String);

/// Isolates the main readable content of an HTML document.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        html: &str,
        base_url: &str,
        classes_to_preserve: &[String],
    ) -> Result<ExtractedContent, ExtractError>;
}

/// Mozilla Readability port (via `dom_smoothie`).
#[derive(Debug, Clone, Default)]
pub struct ReadabilityExtractor;

impl Extractor for ReadabilityExtractor {
    fn extract(
        &self,
        html: &str,
        base_url: &str,
        classes_to_preserve: &[String],
    ) -> Result<ExtractedContent, ExtractError> {
        let cfg = Config {
            classes_to_preserve: classes_to_preserve.to_vec(),
            ..Default::default()
        };

        let mut readability = Readability::new(html, Some(base_url), Some(cfg))
            .map_err(|err| ExtractError(err.to_string()))?;
        let article = readability
            .parse()
            .map_err(|err| ExtractError(err.to_string()))?;

        Ok(ExtractedContent {
            title: non_empty(article.title),
            byline: article.byline.and_then(non_empty),
            excerpt: article.excerpt.and_then(non_empty),
            content_html: article.content.to_string(),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
