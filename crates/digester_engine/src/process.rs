use digester_core::Article;
use digester_logging::digester_warn;
use url::Url;

use crate::extract::{ExtractError, Extractor, ReadabilityExtractor};
use crate::filter::{remove_tags, IMAGE_TAGS, TABLE_TAGS, VIDEO_TAGS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Extracted content shorter than this (in bytes) fails; 0 disables.
    pub min_content_length: usize,
    /// Extracted content is cut to this many bytes; 0 disables.
    pub max_content_length: usize,
    pub include_images: bool,
    pub include_tables: bool,
    pub include_videos: bool,
    /// Class names kept on elements by the readability pass.
    pub classes_to_preserve: Vec<String>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            min_content_length: 100,
            max_content_length: 0,
            include_images: true,
            include_tables: true,
            include_videos: true,
            classes_to_preserve: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Extraction produced too little content to be worth keeping.
    #[error("content processing failed: extracted {actual} bytes, need at least {min}")]
    ContentProcessingFailed { actual: usize, min: usize },
    #[error("invalid article url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("unknown processor: {0}")]
    UnknownProcessor(String),
}

impl ProcessError {
    pub fn is_content_processing_failed(&self) -> bool {
        matches!(self, ProcessError::ContentProcessingFailed { .. })
    }
}

pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite `article.content` in place. Empty content is left alone.
    fn process(&self, article: &mut Article, options: &ProcessOptions) -> Result<(), ProcessError>;
}

/// Names accepted by [`processors_from_names`].
pub const AVAILABLE_PROCESSORS: &[&str] = &["readability", "sanitizer"];

pub fn processor_by_name(name: &str) -> Result<Box<dyn Processor>, ProcessError> {
    match name {
        "readability" => Ok(Box::new(ReadabilityProcessor::default())),
        "sanitizer" => Ok(Box::new(SanitizerProcessor)),
        other => Err(ProcessError::UnknownProcessor(other.to_string())),
    }
}

pub fn processors_from_names<S: AsRef<str>>(
    names: &[S],
) -> Result<Vec<Box<dyn Processor>>, ProcessError> {
    names.iter().map(|n| processor_by_name(n.as_ref())).collect()
}

/// Reduces an article's HTML to its main content and applies the length
/// policy and category filters.
///
/// Not idempotent: running it twice re-extracts from already extracted
/// content.
pub struct ReadabilityProcessor {
    extractor: Box<dyn Extractor>,
}

impl ReadabilityProcessor {
    pub fn new(extractor: Box<dyn Extractor>) -> Self {
        Self { extractor }
    }
}

impl Default for ReadabilityProcessor {
    fn default() -> Self {
        Self::new(Box::new(ReadabilityExtractor))
    }
}

impl Processor for ReadabilityProcessor {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn process(&self, article: &mut Article, options: &ProcessOptions) -> Result<(), ProcessError> {
        if article.content.is_empty() {
            return Ok(());
        }

        Url::parse(&article.url).map_err(|err| ProcessError::InvalidUrl {
            url: article.url.clone(),
            message: err.to_string(),
        })?;

        let extracted =
            self.extractor
                .extract(&article.content, &article.url, &options.classes_to_preserve)?;

        let mut content = extracted.content_html;
        if options.min_content_length > 0 && content.len() < options.min_content_length {
            return Err(ProcessError::ContentProcessingFailed {
                actual: content.len(),
                min: options.min_content_length,
            });
        }
        if options.max_content_length > 0 && content.len() > options.max_content_length {
            truncate_at_boundary(&mut content, options.max_content_length);
        }

        content = apply_filters(content, options, &article.url);
        article.content = content;

        if article.title.is_empty() {
            if let Some(title) = extracted.title {
                article.title = title;
            }
        }
        if article.author.is_empty() {
            if let Some(byline) = extracted.byline {
                article.author = byline;
            }
        }
        if article.summary.is_empty() {
            if let Some(excerpt) = extracted.excerpt {
                article.summary = excerpt;
            }
        }
        Ok(())
    }
}

/// Byte truncation, backing off to a char boundary. Not HTML-aware: a cut
/// inside a tag leaves that tag unterminated.
fn truncate_at_boundary(content: &mut String, max: usize) {
    let mut end = max;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    content.truncate(end);
}

fn apply_filters(content: String, options: &ProcessOptions, url: &str) -> String {
    let categories = [
        (options.include_images, IMAGE_TAGS, "images"),
        (options.include_tables, TABLE_TAGS, "tables"),
        (options.include_videos, VIDEO_TAGS, "videos"),
    ];

    let mut content = content;
    for (include, tags, label) in categories {
        if include {
            continue;
        }
        match remove_tags(&content, tags) {
            Ok(filtered) => content = filtered,
            Err(err) => {
                digester_warn!("error removing {} from {}: {}; keeping content", label, url, err);
            }
        }
    }
    content
}

/// Cleans markup with ammonia's default (user generated content) policy,
/// additionally allowing `data:` URLs so inline images survive.
#[derive(Debug, Default, Clone, Copy)]
pub struct SanitizerProcessor;

impl Processor for SanitizerProcessor {
    fn name(&self) -> &'static str {
        "sanitizer"
    }

    fn process(&self, article: &mut Article, _options: &ProcessOptions) -> Result<(), ProcessError> {
        if article.content.is_empty() {
            return Ok(());
        }
        let mut builder = ammonia::Builder::default();
        builder.add_url_schemes(["data"]);
        article.content = builder.clean(&article.content).to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_at_boundary;

    #[test]
    fn truncation_backs_off_to_char_boundary() {
        let mut s = "aé".to_string(); // 'é' is two bytes
        truncate_at_boundary(&mut s, 2);
        assert_eq!(s, "a");
    }
}
