use ego_tree::NodeId;
use scraper::Selector;

use crate::fragment::{parse_fragment, serialize_fragment, FragmentError};

/// Tag names dropped when images are excluded.
pub const IMAGE_TAGS: &[&str] = &["img"];
/// Tag names dropped when tables are excluded.
pub const TABLE_TAGS: &[&str] = &["table"];
/// Tag names dropped when videos are excluded.
pub const VIDEO_TAGS: &[&str] = &["video", "iframe"];

/// Remove every element named in `tags` (with its whole subtree) from an
/// HTML fragment. Works on the parsed tree, so nested and malformed markup
/// is handled by the HTML5 parser and neighbouring content is left alone.
pub fn remove_tags(html: &str, tags: &[&str]) -> Result<String, FragmentError> {
    if tags.is_empty() {
        return Ok(html.to_string());
    }
    let Ok(selector) = Selector::parse(&tags.join(", ")) else {
        return Ok(html.to_string());
    };

    let mut fragment = parse_fragment(html);
    let doomed: Vec<NodeId> = fragment.select(&selector).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }
    serialize_fragment(&fragment)
}
