//! Parse and re-serialize HTML fragments.
//!
//! `scraper`'s fragment parser hangs the parsed nodes under a synthetic
//! `<html>` root element (no `<head>`/`<body>` are created in fragment mode).
//! Serializing that root therefore yields exactly
//! `FRAGMENT_PREFIX + fragment + FRAGMENT_SUFFIX`. [`serialize_fragment`]
//! strips that scaffolding and refuses to guess if it ever looks different.
//!
//! [`serialize_fragment_xhtml`] writes the same tree as well-formed XML for
//! EPUB content documents.

use ego_tree::NodeRef;
use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::{Html, Node};
use thiserror::Error;

/// Scaffolding emitted before the fragment when serializing the root.
pub const FRAGMENT_PREFIX: &str = "<html>";
/// Scaffolding emitted after the fragment when serializing the root.
pub const FRAGMENT_SUFFIX: &str = "</html>";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FragmentError {
    #[error("serialized fragment is not wrapped in <html>..</html>: {head:?}")]
    UnexpectedWrapper { head: String },
}

pub fn parse_fragment(html: &str) -> Html {
    Html::parse_fragment(html)
}

/// Serialize a parsed (and possibly mutated) fragment back to markup.
pub fn serialize_fragment(fragment: &Html) -> Result<String, FragmentError> {
    let serialized = fragment.root_element().html();
    strip_wrapper(&serialized)
        .map(str::to_string)
        .ok_or_else(|| FragmentError::UnexpectedWrapper {
            head: serialized.chars().take(32).collect(),
        })
}

/// Elements written as `<name/>` in XHTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Serialize a parsed fragment as XHTML: void elements are self-closed,
/// text and attribute values only use the XML entities (`&amp;` `&lt;`
/// `&gt;` `&quot;`), and characters XML 1.0 forbids are dropped.
///
/// Comments are dropped. Elements and attributes whose names are not plain
/// XML names (including prefixed ones such as `foo:bar`) cannot be
/// expressed without namespace declarations: such elements are unwrapped
/// and such attributes skipped.
pub fn serialize_fragment_xhtml(fragment: &Html) -> Result<String, FragmentError> {
    let root = fragment.root_element();
    if root.value().name() != "html" {
        return Err(FragmentError::UnexpectedWrapper {
            head: root.html().chars().take(32).collect(),
        });
    }
    let mut out = String::new();
    for child in root.children() {
        write_xhtml(child, &mut out);
    }
    Ok(out)
}

fn write_xhtml(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&encode_text(&xml_chars(text))),
        Node::Element(element) => {
            let name = element.name();
            if !is_xml_name(name) {
                for child in node.children() {
                    write_xhtml(child, out);
                }
                return;
            }
            out.push('<');
            out.push_str(name);
            for (attr, value) in element.attrs() {
                if is_xml_name(attr) && attr != "xmlns" {
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    out.push_str(&encode_double_quoted_attribute(&xml_chars(value)));
                    out.push('"');
                }
            }
            if VOID_ELEMENTS.contains(&name) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in node.children() {
                write_xhtml(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        _ => {}
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect()
}

fn strip_wrapper(serialized: &str) -> Option<&str> {
    serialized
        .strip_prefix(FRAGMENT_PREFIX)?
        .strip_suffix(FRAGMENT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_requires_both_ends() {
        assert_eq!(strip_wrapper("<html><p>x</p></html>"), Some("<p>x</p>"));
        assert_eq!(strip_wrapper("<body><p>x</p></body>"), None);
        assert_eq!(strip_wrapper("<html><p>x</p>"), None);
    }

    #[test]
    fn xhtml_closes_void_elements_and_uses_xml_entities() {
        let fragment = parse_fragment(
            r#"<p>line<br>two&nbsp;x &amp; <abbr title='say "hi"'>y</abbr></p><img src="a.png?x=1&amp;y=2"><hr>"#,
        );
        assert_eq!(
            serialize_fragment_xhtml(&fragment).unwrap(),
            "<p>line<br/>two\u{a0}x &amp; <abbr title=\"say &quot;hi&quot;\">y</abbr></p>\
             <img src=\"a.png?x=1&amp;y=2\"/><hr/>"
        );
    }

    #[test]
    fn xhtml_drops_comments_and_unsafe_names() {
        let fragment = parse_fragment(
            "<div foo:bar=\"1\" data-id=\"7\"><!-- note --><span>a\u{1}b</span></div>",
        );
        assert_eq!(
            serialize_fragment_xhtml(&fragment).unwrap(),
            "<div data-id=\"7\"><span>ab</span></div>"
        );
    }
}
