use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::Article;

/// Sortable article attributes. String forms match the field names used in
/// configuration (`"Title"`, `"PublishedAt"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Author,
    PublishedAt,
    Url,
    Content,
    Summary,
    SourceName,
}

impl SortKey {
    pub const ALL: [SortKey; 7] = [
        SortKey::Title,
        SortKey::Author,
        SortKey::PublishedAt,
        SortKey::Url,
        SortKey::Content,
        SortKey::Summary,
        SortKey::SourceName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Title => "Title",
            SortKey::Author => "Author",
            SortKey::PublishedAt => "PublishedAt",
            SortKey::Url => "URL",
            SortKey::Content => "Content",
            SortKey::Summary => "Summary",
            SortKey::SourceName => "SourceName",
        }
    }

    fn compare(self, a: &Article, b: &Article) -> Ordering {
        match self {
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Author => a.author.cmp(&b.author),
            SortKey::PublishedAt => a.published_at.cmp(&b.published_at),
            SortKey::Url => a.url.cmp(&b.url),
            SortKey::Content => a.content.cmp(&b.content),
            SortKey::Summary => a.summary.cmp(&b.summary),
            SortKey::SourceName => a.source_name.cmp(&b.source_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SortFieldError {
    #[error("invalid sort field format: {0}")]
    Format(String),
    #[error("invalid sort field: {0}")]
    UnknownField(String),
    #[error("invalid sort direction: {0}")]
    Direction(String),
}

impl FromStr for SortField {
    type Err = SortFieldError;

    /// Parses `"Field"` or `"Field:direction"`; direction defaults to `asc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default();
        let direction = parts.next();
        if parts.next().is_some() {
            return Err(SortFieldError::Format(s.to_string()));
        }

        let key = SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| SortFieldError::UnknownField(name.to_string()))?;

        let direction = match direction {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(SortFieldError::Direction(other.to_string())),
        };

        Ok(SortField { key, direction })
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{dir}", self.key.as_str())
    }
}

/// Stable multi-key sort: the first key that differs decides, ties keep
/// their input order.
pub fn sort_articles(articles: &mut [Article], fields: &[SortField]) {
    if articles.len() <= 1 || fields.is_empty() {
        return;
    }
    articles.sort_by(|a, b| {
        for field in fields {
            let ord = field.key.compare(a, b);
            if ord != Ordering::Equal {
                return match field.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
            }
        }
        Ordering::Equal
    });
}

/// Parses every field first, then sorts. Nothing is reordered on error.
pub fn sort_articles_by<S: AsRef<str>>(
    articles: &mut [Article],
    fields: &[S],
) -> Result<(), SortFieldError> {
    let parsed = fields
        .iter()
        .map(|f| f.as_ref().parse::<SortField>())
        .collect::<Result<Vec<_>, _>>()?;
    sort_articles(articles, &parsed);
    Ok(())
}
