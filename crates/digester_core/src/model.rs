use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Source-specific facts attached to an article or digest. Ordered so that
/// rendered metadata blocks are deterministic.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Well-known metadata keys written by the source adapters.
pub mod metadata_keys {
    /// Story score (points).
    pub const SCORE: &str = "score";
    /// Number of comments on the story.
    pub const COMMENTS: &str = "comments";
    /// Source-side item identifier.
    pub const ID: &str = "id";
    /// Link to the discussion page.
    pub const COMMENTS_URL: &str = "comments_url";
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(v) => write!(f, "{v}"),
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(v) => write!(f, "{v}"),
            MetadataValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::List(value)
    }
}

/// One normalized unit of content. `url` is its identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Article {
    pub title: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
    /// HTML fragment.
    pub content: String,
    pub summary: String,
    pub source_name: String,
    pub tags: Vec<String>,
    pub metadata: Metadata,
}

impl Article {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<Article>,
    pub metadata: Metadata,
}

impl Digest {
    pub fn new(title: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            generated_at,
            articles: Vec::new(),
            metadata: Metadata::new(),
        }
    }
}
