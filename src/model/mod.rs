//! # Content Model
//!
//! The input representation for the pagination engine: a rendered content
//! tree. It is deliberately DOM-shaped, because it is produced either from
//! the rendering engine's markup or directly as JSON: elements with a tag,
//! text, and one special node, the **Frame**, an isolation boundary wrapping
//! a complete embedded sub-document whose layout runs independently.
//!
//! Nodes are identified by [`NodePath`], the child-index route from the root.
//! Paths are stable for a given tree shape and recomputed on every pass.

use std::collections::BTreeMap;
use std::fmt;

use crate::style::{BreakInside, Style};
use serde::{Deserialize, Serialize};

/// Class that marks a node as "must not be split across a page boundary".
pub const UNBREAKABLE_CLASS: &str = "skrift-unbreakable";
/// Attribute equivalent of [`UNBREAKABLE_CLASS`].
pub const UNBREAKABLE_ATTR: &str = "data-unbreakable";

/// A node in the rendered content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    /// What kind of node this is.
    pub kind: NodeKind,

    /// Inline style of the node.
    #[serde(default)]
    pub style: Style,

    /// Class list, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    /// Remaining attributes (everything except `class` and `style`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Child nodes. Always empty for text and frames.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
}

/// The different kinds of nodes in the content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    /// A regular element, e.g. `div`, `p`, `table`.
    Element { tag: String },

    /// Character data.
    Text { content: String },

    /// An isolation boundary: an embedded document (an `iframe` with a
    /// `srcdoc`). Its interior is opaque to the main tree.
    Frame {
        #[serde(rename = "srcDoc")]
        src_doc: String,
    },
}

impl ContentNode {
    /// Create an element node with children.
    pub fn element(tag: &str, children: Vec<ContentNode>) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            style: Style::default(),
            classes: vec![],
            attributes: BTreeMap::new(),
            children,
        }
    }

    /// Create a text node.
    pub fn text(content: &str) -> Self {
        Self {
            kind: NodeKind::Text {
                content: content.to_string(),
            },
            style: Style::default(),
            classes: vec![],
            attributes: BTreeMap::new(),
            children: vec![],
        }
    }

    /// Create an isolation boundary around an embedded document.
    pub fn frame(src_doc: &str) -> Self {
        Self {
            kind: NodeKind::Frame {
                src_doc: src_doc.to_string(),
            },
            style: Style::default(),
            classes: vec![],
            attributes: BTreeMap::new(),
            children: vec![],
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Shorthand for an element marked unbreakable.
    pub fn unbreakable(self) -> Self {
        self.with_class(UNBREAKABLE_CLASS)
    }

    /// The element tag, `"#text"` for text and `"iframe"` for frames.
    pub fn tag(&self) -> &str {
        match &self.kind {
            NodeKind::Element { tag } => tag,
            NodeKind::Text { .. } => "#text",
            NodeKind::Frame { .. } => "iframe",
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Is this node marked "must not be split"?
    pub fn is_unbreakable(&self) -> bool {
        is_unbreakable_marker(
            self.classes.iter().map(String::as_str),
            self.attributes.get(UNBREAKABLE_ATTR).map(String::as_str),
            self.style.break_inside,
        )
    }

    /// The embedded markup if this node is an isolation boundary.
    pub fn isolated_markup(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Frame { src_doc } => Some(src_doc),
            _ => None,
        }
    }

    /// A copy of this node without its children.
    pub fn clone_shallow(&self) -> ContentNode {
        ContentNode {
            kind: self.kind.clone(),
            style: self.style.clone(),
            classes: self.classes.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    /// Look up a descendant by path.
    pub fn at(&self, path: &NodePath) -> Option<&ContentNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &idx| node.children.get(idx))
    }

    /// Concatenated text content of this subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let NodeKind::Text { content } = &self.kind {
            out.push_str(content);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// The unbreakable predicate, shared by content nodes and raw markup tags.
pub(crate) fn is_unbreakable_marker<'a>(
    mut classes: impl Iterator<Item = &'a str>,
    unbreakable_attr: Option<&str>,
    break_inside: Option<BreakInside>,
) -> bool {
    classes.any(|c| c == UNBREAKABLE_CLASS)
        || unbreakable_attr.is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || break_inside == Some(BreakInside::Avoid)
}

/// Child-index route from the tree root to a node. The root is the empty
/// path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The path of this node's `index`-th child.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .0
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("-");
        f.write_str(&key)
    }
}

/// An axis-aligned box in CSS pixels, relative to a measurement container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// The same box moved down by `dy`.
    pub fn offset_y(&self, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            ..*self
        }
    }
}

/// Standard page sizes in CSS pixels (96 dpi).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Every named size, in catalog order.
    pub const CATALOG: [PageSize; 6] = [
        PageSize::A3,
        PageSize::A4,
        PageSize::A5,
        PageSize::Letter,
        PageSize::Legal,
        PageSize::Tabloid,
    ];

    /// Returns (width, height) in CSS pixels.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A3 => (1123.0, 1587.0),
            PageSize::A4 => (794.0, 1123.0),
            PageSize::A5 => (559.0, 794.0),
            PageSize::Letter => (816.0, 1056.0),
            PageSize::Legal => (816.0, 1344.0),
            PageSize::Tabloid => (1056.0, 1632.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }

    pub fn width(&self) -> f64 {
        self.dimensions().0
    }

    pub fn height(&self) -> f64 {
        self.dimensions().1
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageSize::A3 => "A3",
            PageSize::A4 => "A4",
            PageSize::A5 => "A5",
            PageSize::Letter => "Letter",
            PageSize::Legal => "Legal",
            PageSize::Tabloid => "Tabloid",
            PageSize::Custom { .. } => "Custom",
        }
    }

    /// Look up a catalog entry by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<PageSize> {
        Self::CATALOG
            .into_iter()
            .find(|size| size.name().eq_ignore_ascii_case(name.trim()))
    }
}
