//! Digester core: pure data model and digest assembly.
mod assemble;
mod model;
mod sort;

pub use assemble::{dedup_by_url, filter_by_denylist};
pub use model::{metadata_keys, Article, Digest, Metadata, MetadataValue};
pub use sort::{
    sort_articles, sort_articles_by, SortDirection, SortField, SortFieldError, SortKey,
};
