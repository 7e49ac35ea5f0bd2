//! # Markup
//!
//! Bridges the rendering engine's output (a markup string) and the content
//! tree. Three operations:
//!
//! - [`parse_markup`]: markup → [`ContentNode`] tree
//! - [`to_markup`]: tree → markup
//! - [`set_marked_margin_top`]: patch the first unbreakable start tag of a
//!   markup string in place, leaving every other byte alone
//!
//! Rendered templates are XHTML-flavoured HTML. The reader is configured to be
//! forgiving: mismatched end tags are tolerated, HTML void elements never
//! open a scope, and entities the XML escaper doesn't know are kept raw.

use std::borrow::Cow;

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{FolioError, Result};
use crate::model::{is_unbreakable_marker, ContentNode, NodeKind, UNBREAKABLE_ATTR};
use crate::style::{strip_declaration, Style};

/// HTML elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn reader(markup: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().check_end_names = false;
    reader
}

fn markup_error(reader: &Reader<&[u8]>, message: impl ToString) -> FolioError {
    FolioError::Markup {
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}

/// Decode raw bytes and resolve XML entities. Unknown entities (`&nbsp;`)
/// are left as written.
fn decode(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match unescape(&text) {
        Ok(resolved) => resolved.into_owned(),
        Err(_) => text.into_owned(),
    }
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

/// Convert a start tag into a node (without children).
fn node_from_start(e: &BytesStart) -> ContentNode {
    let tag = tag_name(e);
    let mut node = ContentNode::element(&tag, vec![]);
    let mut src_doc = None;
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = decode(&attr.value);
        match key.as_str() {
            "class" => node.classes = value.split_whitespace().map(str::to_string).collect(),
            "style" => node.style = Style::parse_inline(&value),
            "srcdoc" if tag == "iframe" => src_doc = Some(value),
            _ => {
                node.attributes.insert(key, value);
            }
        }
    }
    if let Some(src_doc) = src_doc {
        node.kind = NodeKind::Frame { src_doc };
    }
    node
}

/// Parse markup into a content tree.
///
/// Comments, processing instructions and the doctype are dropped, as is
/// whitespace-only text. A single top-level element becomes the root;
/// anything else is wrapped in a `div`.
pub fn parse_markup(markup: &str) -> Result<ContentNode> {
    let mut reader = reader(markup);
    // Open elements; the bottom entry collects top-level nodes.
    let mut stack: Vec<ContentNode> = vec![ContentNode::element("div", vec![])];

    loop {
        let event = reader
            .read_event()
            .map_err(|e| markup_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                let node = node_from_start(&e);
                if is_void(node.tag()) {
                    push_child(&mut stack, node);
                } else {
                    stack.push(node);
                }
            }
            Event::Empty(e) => push_child(&mut stack, node_from_start(&e)),
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if is_void(&name) {
                    continue;
                }
                // Close up to the matching open element; a stray end tag
                // with no match is ignored.
                if let Some(depth) = stack.iter().skip(1).rposition(|n| n.tag() == name) {
                    while stack.len() > depth + 1 {
                        if let Some(done) = stack.pop() {
                            push_child(&mut stack, done);
                        }
                    }
                }
            }
            Event::Text(e) => {
                let text = decode(&e);
                if !text.trim().is_empty() {
                    push_child(&mut stack, ContentNode::text(&text));
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                if !text.trim().is_empty() {
                    push_child(&mut stack, ContentNode::text(&text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unclosed elements close at end of input.
    while stack.len() > 1 {
        if let Some(done) = stack.pop() {
            push_child(&mut stack, done);
        }
    }
    let mut fragment = stack.pop().unwrap_or_else(|| ContentNode::element("div", vec![]));
    if fragment.children.len() == 1
        && matches!(fragment.children[0].kind, NodeKind::Element { .. })
    {
        return Ok(fragment.children.remove(0));
    }
    Ok(fragment)
}

fn push_child(stack: &mut [ContentNode], node: ContentNode) {
    if let Some(parent) = stack.last_mut() {
        // Frames are opaque; anything nested in the iframe element itself
        // is fallback content and is dropped.
        if !matches!(parent.kind, NodeKind::Frame { .. }) {
            parent.children.push(node);
        }
    }
}

/// Serialize a content tree to markup.
pub fn to_markup(node: &ContentNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &ContentNode, out: &mut String) {
    let tag = match &node.kind {
        NodeKind::Text { content } => {
            out.push_str(&escape(content.as_str()));
            return;
        }
        NodeKind::Element { tag } => tag.as_str(),
        NodeKind::Frame { .. } => "iframe",
    };

    out.push('<');
    out.push_str(tag);
    if !node.classes.is_empty() {
        push_attr(out, "class", &node.classes.join(" "));
    }
    let style = node.style.to_inline();
    if !style.is_empty() {
        push_attr(out, "style", &style);
    }
    for (name, value) in &node.attributes {
        push_attr(out, name, value);
    }
    if let NodeKind::Frame { src_doc } = &node.kind {
        push_attr(out, "srcdoc", src_doc);
    }

    if is_void(tag) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &node.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn is_marked(e: &BytesStart) -> bool {
    let mut classes = String::new();
    let mut attr_flag = None;
    let mut style = None;
    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        if key.eq_ignore_ascii_case(b"class") {
            classes = decode(&attr.value);
        } else if key.eq_ignore_ascii_case(UNBREAKABLE_ATTR.as_bytes()) {
            attr_flag = Some(decode(&attr.value));
        } else if key.eq_ignore_ascii_case(b"style") {
            style = Some(Style::parse_inline(&decode(&attr.value)));
        }
    }
    is_unbreakable_marker(
        classes.split_whitespace(),
        attr_flag.as_deref(),
        style.and_then(|s| s.break_inside),
    )
}

/// Rebuild a start tag with its `margin-top` replaced by `margin_top` px.
fn with_margin_top(e: &BytesStart, margin_top: f64) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(name);
    let mut existing = String::new();
    for attr in e.attributes().flatten() {
        if attr.key.as_ref().eq_ignore_ascii_case(b"style") {
            existing = decode(&attr.value);
        } else {
            patched.push_attribute(attr);
        }
    }
    let kept = strip_declaration(&existing, "margin-top");
    let declaration = format!("margin-top: {margin_top}px !important");
    let style = if kept.is_empty() {
        format!("{declaration};")
    } else {
        format!("{kept}; {declaration};")
    };
    patched.push_attribute(("style", style.as_str()));
    patched
}

/// Set the top margin of the first unbreakable element inside `markup`.
///
/// Any earlier `margin-top` declaration on that element is removed first, so
/// repeated calls with the same value produce the same markup. Markup without
/// an unbreakable element is returned unchanged.
pub fn set_marked_margin_top(markup: &str, margin_top: f64) -> Result<String> {
    let mut reader = reader(markup);
    let mut writer = Writer::new(Vec::with_capacity(markup.len() + 48));
    let mut patched = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| markup_error(&reader, e))?;
        let event = match event {
            Event::Eof => break,
            Event::Start(e) if !patched && is_marked(&e) => {
                patched = true;
                Event::Start(with_margin_top(&e, margin_top))
            }
            Event::Empty(e) if !patched && is_marked(&e) => {
                patched = true;
                Event::Empty(with_margin_top(&e, margin_top))
            }
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| markup_error(&reader, e))?;
    }

    if !patched {
        return Ok(markup.to_string());
    }
    String::from_utf8(writer.into_inner()).map_err(|e| markup_error(&reader, e))
}

/// Cheap check used before paying for a parse: does this markup mention an
/// unbreakable marker at all?
pub fn mentions_unbreakable(markup: &str) -> bool {
    let lower: Cow<'_, str> = if markup.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(markup.to_ascii_lowercase())
    } else {
        Cow::Borrowed(markup)
    };
    lower.contains(crate::model::UNBREAKABLE_CLASS)
        || lower.contains(UNBREAKABLE_ATTR)
        || lower.contains("break-inside")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Dimension;

    #[test]
    fn parses_document_structure() {
        let tree = parse_markup(
            r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>T</title></head>
               <body><p class="a b" style="margin-top: 4px">Hello &amp; bye</p><br></body></html>"#,
        )
        .unwrap();
        assert_eq!(tree.tag(), "html");
        let body = &tree.children[1];
        assert_eq!(body.tag(), "body");
        assert_eq!(body.children.len(), 2);
        let p = &body.children[0];
        assert_eq!(p.classes, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(p.style.margin_top, Some(Dimension::Px(4.0)));
        assert_eq!(p.text_content(), "Hello & bye");
        assert_eq!(body.children[1].tag(), "br");
    }

    #[test]
    fn iframe_srcdoc_becomes_a_frame() {
        let markup = r#"<div><iframe srcdoc="&lt;p&gt;inner&lt;/p&gt;" title="x"></iframe></div>"#;
        let tree = parse_markup(markup).unwrap();
        let frame = &tree.children[0];
        assert_eq!(frame.isolated_markup(), Some("<p>inner</p>"));
        assert_eq!(frame.attributes.get("title").map(String::as_str), Some("x"));
    }

    #[test]
    fn fragments_are_wrapped() {
        let tree = parse_markup("<p>a</p><p>b</p>").unwrap();
        assert_eq!(tree.tag(), "div");
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn unknown_entities_are_kept_raw() {
        let tree = parse_markup("<p>a&nbsp;b</p>").unwrap();
        assert_eq!(tree.text_content(), "a&nbsp;b");
    }

    #[test]
    fn serializer_round_trips_structure() {
        let source = r#"<div class="skrift-unbreakable" style="height: 40px"><p>x &lt; y</p><hr/></div>"#;
        let tree = parse_markup(source).unwrap();
        let again = parse_markup(&to_markup(&tree)).unwrap();
        assert_eq!(tree, again);
    }

    #[test]
    fn margin_patch_targets_first_marked_element() {
        let markup = r#"<body><p>lead</p><div class="skrift-unbreakable" style="color: red; margin-top: 3px">a</div><div class="skrift-unbreakable">b</div></body>"#;
        let patched = set_marked_margin_top(markup, 120.0).unwrap();
        assert!(patched.contains(r#"style="color: red; margin-top: 120px !important;""#));
        assert!(patched.contains(r#"<div class="skrift-unbreakable">b</div>"#));
        assert!(patched.starts_with("<body><p>lead</p>"));
    }

    #[test]
    fn margin_patch_is_idempotent() {
        let markup = r#"<div><section data-unbreakable="true">a</section></div>"#;
        let once = set_marked_margin_top(markup, 50.0).unwrap();
        let twice = set_marked_margin_top(&once, 50.0).unwrap();
        assert_eq!(once, twice);
        let tree = parse_markup(&twice).unwrap();
        assert_eq!(tree.children[0].style.margin_top, Some(Dimension::Px(50.0)));
    }

    #[test]
    fn margin_patch_without_marker_is_identity() {
        let markup = "<div><p>plain</p></div>";
        assert_eq!(set_marked_margin_top(markup, 10.0).unwrap(), markup);
    }

    #[test]
    fn detects_marker_mentions() {
        assert!(mentions_unbreakable("<div class='SKRIFT-UNBREAKABLE'>"));
        assert!(!mentions_unbreakable("<div class='plain'>"));
    }
}
