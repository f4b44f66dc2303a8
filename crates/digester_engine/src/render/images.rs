//! Image embedding for packaged output.
//!
//! The DOM is never held across an await: sources are collected in one
//! parse, downloaded, then written back in a second parse of the same
//! markup. Parsing is deterministic, so the n-th `<img>` is the same
//! element both times.

use std::collections::HashMap;

use digester_logging::{digester_debug, digester_warn};
use ego_tree::NodeId;
use scraper::{Node, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::Fetcher;
use crate::fragment::{parse_fragment, serialize_fragment, FragmentError};
use crate::render::assets::AssetStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageUrlError {
    #[error("empty image source")]
    Empty,
    #[error("inline data url")]
    Inline,
    #[error("relative source {0:?} without a usable base url")]
    NoBase(String),
    #[error("cannot parse image url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum EmbedError {
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Fragment(#[from] FragmentError),
}

fn img_selector() -> Selector {
    Selector::parse("img").unwrap_or_else(|_| unreachable!("static selector"))
}

/// `src` of every `<img>` in document order (`None` when absent).
pub fn collect_image_sources(content: &str) -> Vec<Option<String>> {
    let fragment = parse_fragment(content);
    fragment
        .select(&img_selector())
        .map(|img| img.value().attr("src").map(str::to_string))
        .collect()
}

/// Replace the `src` of the `<img>` elements whose document-order index
/// appears in `replacements`, then re-serialize.
pub fn rewrite_image_sources(
    content: &str,
    replacements: &HashMap<usize, String>,
) -> Result<String, FragmentError> {
    let mut fragment = parse_fragment(content);
    let ids: Vec<NodeId> = fragment.select(&img_selector()).map(|img| img.id()).collect();

    for (index, id) in ids.into_iter().enumerate() {
        let Some(new_src) = replacements.get(&index) else {
            continue;
        };
        let Some(mut node) = fragment.tree.get_mut(id) else {
            continue;
        };
        if let Node::Element(element) = node.value() {
            for (name, value) in element.attrs.iter_mut() {
                if &*name.local == "src" {
                    *value = new_src.as_str().into();
                }
            }
        }
    }
    serialize_fragment(&fragment)
}

/// Resolve an `<img src>` against the article URL. Only http(s) results
/// are downloadable; inline `data:` sources are reported as such.
pub fn resolve_image_url(src: &str, base: Option<&Url>) -> Result<Url, ImageUrlError> {
    let src = src.trim();
    if src.is_empty() {
        return Err(ImageUrlError::Empty);
    }
    let lower = src.to_ascii_lowercase();
    if lower.starts_with("data:") {
        return Err(ImageUrlError::Inline);
    }

    let resolved = if lower.starts_with("http://") || lower.starts_with("https://") {
        Url::parse(src)?
    } else {
        match base {
            Some(base) => base.join(src)?,
            None => return Err(ImageUrlError::NoBase(src.to_string())),
        }
    };

    match resolved.scheme() {
        "http" | "https" => Ok(resolved),
        other => Err(ImageUrlError::UnsupportedScheme(other.to_string())),
    }
}

/// Download every resolvable image of one article into `store` and return
/// the content with `src` attributes pointing at the package paths.
///
/// A failing image is logged and keeps its original `src`. Cancellation
/// aborts the whole article.
pub(crate) async fn embed_article_images(
    content: &str,
    article_url: &str,
    fetcher: &dyn Fetcher,
    store: &mut AssetStore,
    cancel: &CancellationToken,
) -> Result<String, EmbedError> {
    let sources = collect_image_sources(content);
    if sources.is_empty() {
        return Ok(content.to_string());
    }
    let base = Url::parse(article_url).ok();
    let mark = store.mark();
    let mut replacements = HashMap::new();

    for (index, src) in sources.iter().enumerate() {
        let Some(src) = src else { continue };
        let url = match resolve_image_url(src, base.as_ref()) {
            Ok(url) => url,
            Err(ImageUrlError::Inline | ImageUrlError::Empty) => continue,
            Err(err) => {
                digester_warn!("skipping image {:?} in {}: {}", src, article_url, err);
                continue;
            }
        };

        let mut file = match store.temp_file() {
            Ok(file) => file,
            Err(err) => {
                digester_warn!("cannot create temp file for {}: {}", url, err);
                continue;
            }
        };
        let metadata = match fetcher.stream(url.as_str(), file.as_file_mut(), cancel).await {
            Ok(metadata) => metadata,
            Err(err) if err.is_cancelled() => {
                store.rollback_to(mark);
                return Err(EmbedError::Cancelled);
            }
            Err(err) => {
                digester_warn!("error downloading image {}: {}", url, err);
                continue;
            }
        };

        match store.register(file, url.as_str(), metadata.content_type.as_deref()) {
            Ok(asset) => {
                digester_debug!("embedded {} as {}", url, asset.href);
                replacements.insert(index, asset.href.clone());
            }
            Err(err) => digester_warn!("discarding image {}: {}", url, err),
        }
    }

    if replacements.is_empty() {
        return Ok(content.to_string());
    }
    match rewrite_image_sources(content, &replacements) {
        Ok(rewritten) => Ok(rewritten),
        Err(err) => {
            store.rollback_to(mark);
            Err(err.into())
        }
    }
}
