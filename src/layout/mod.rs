//! # Layout
//!
//! Geometry for content trees. The pagination engine never lays anything out
//! itself; it asks a [`LayoutSurface`] where things ended up, the way a
//! browser-hosted preview would read `getBoundingClientRect()` off a hidden
//! measurement container.
//!
//! [`BlockLayout`] is the built-in headless surface. It implements the part of
//! CSS block flow that decides vertical positions:
//!
//! 1. Children stack vertically inside their parent's content box.
//! 2. Adjacent sibling margins collapse to the larger of the two.
//! 3. A first child's top margin collapses through a parent that has no top
//!    padding (the parent's top edge moves instead of the child's).
//! 4. Explicit `height` wins over content height; `min-height` is a floor.
//! 5. `tr` rows place their cells side by side; the row is as tall as its
//!    tallest cell.
//! 6. Text height is estimated from character count and font metrics.
//! 7. Frames lay out their embedded document unless they have a fixed height.

use crate::markup::parse_markup;
use crate::model::{Bounds, ContentNode, NodeKind, NodePath};

/// Tags that never produce boxes.
const NON_RENDERED: &[&str] = &["head", "style", "script", "title", "meta", "link", "template"];

/// A laid-out node.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    /// Path of the node this box belongs to.
    pub path: NodePath,
    /// Border box, relative to the measurement container.
    pub bounds: Bounds,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub padding_top: f64,
    /// True when a first child's top margin collapses through this box.
    pub collapse_through: bool,
    /// `display: none` or a non-rendered element.
    pub hidden: bool,
    pub unbreakable: bool,
    /// True for isolation boundaries (their interior is not in `children`).
    pub isolated: bool,
    pub children: Vec<LayoutBox>,
}

impl LayoutBox {
    /// The first child that takes part in layout.
    pub fn first_visible_child(&self) -> Option<&LayoutBox> {
        self.children.iter().find(|c| !c.hidden)
    }

    /// Find the box for `path`.
    pub fn find(&self, path: &NodePath) -> Option<&LayoutBox> {
        let mut current = self;
        for &idx in path.indices().iter().skip(self.path.depth()) {
            current = current.children.iter().find(|c| c.path.indices().last() == Some(&idx))?;
        }
        (current.path == *path).then_some(current)
    }
}

/// The outcome of laying out a tree inside a measurement container.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    /// The measurement container. Its height is the scroll height of the
    /// content, margins included.
    pub container: Bounds,
    pub root: LayoutBox,
}

impl LayoutResult {
    pub fn content_height(&self) -> f64 {
        self.container.height
    }
}

/// Anything that can report where a content tree's boxes end up.
pub trait LayoutSurface {
    /// Lay `root` out inside a container `width` pixels wide.
    fn layout(&self, root: &ContentNode, width: f64) -> LayoutResult;
}

/// Font metrics used to estimate text height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Default font size in pixels.
    pub font_size: f64,
    /// Default line height as a multiple of the font size.
    pub line_height: f64,
    /// Average glyph advance as a fraction of the font size.
    pub char_width: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            line_height: 1.2,
            char_width: 0.5,
        }
    }
}

/// Inherited text properties while descending the tree.
#[derive(Debug, Clone, Copy)]
struct Inherited {
    font_size: f64,
    line_height: f64,
}

/// Headless block-flow layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockLayout {
    pub metrics: TextMetrics,
}

impl BlockLayout {
    pub fn new(metrics: TextMetrics) -> Self {
        Self { metrics }
    }

    fn is_hidden(node: &ContentNode) -> bool {
        node.style.is_hidden() || NON_RENDERED.contains(&node.tag())
    }

    fn inherit(&self, node: &ContentNode, parent: Inherited) -> Inherited {
        let default_size = match node.tag() {
            "h1" => Some(32.0),
            "h2" => Some(24.0),
            "h3" => Some(18.72),
            _ => None,
        };
        Inherited {
            font_size: node.style.font_size.or(default_size).unwrap_or(parent.font_size),
            line_height: node.style.line_height.unwrap_or(parent.line_height),
        }
    }

    /// Whether a first child's top margin collapses through `node`.
    fn collapses_through(node: &ContentNode, width: f64) -> bool {
        matches!(node.kind, NodeKind::Element { .. })
            && node.tag() != "tr"
            && resolve(node.style.padding_top, width) == 0.0
    }

    /// The margin that ends up above `node`'s border edge once its own top
    /// margin has collapsed with its first descendants'.
    fn collapsed_top(&self, node: &ContentNode, width: f64) -> f64 {
        if Self::is_hidden(node) {
            return 0.0;
        }
        let own = resolve(node.style.margin_top, width);
        if !Self::collapses_through(node, width) {
            return own;
        }
        match node.children.iter().find(|c| !Self::is_hidden(c)) {
            Some(first) => own.max(self.collapsed_top(first, width)),
            None => own,
        }
    }

    fn text_height(&self, content: &str, width: f64, inherited: Inherited) -> f64 {
        let chars = content.split_whitespace().collect::<Vec<_>>().join(" ").chars().count();
        if chars == 0 {
            return 0.0;
        }
        let advance = inherited.font_size * self.metrics.char_width;
        let per_line = if advance > 0.0 && width > 0.0 {
            (width / advance).floor().max(1.0)
        } else {
            chars as f64
        };
        let lines = (chars as f64 / per_line).ceil();
        lines * inherited.font_size * inherited.line_height
    }

    /// Height of an embedded document laid out at `width`.
    fn frame_content_height(&self, src_doc: &str, width: f64) -> f64 {
        match parse_markup(src_doc) {
            Ok(tree) => self.layout(&tree, width).content_height(),
            Err(e) => {
                log::debug!("frame content unparseable, laying out as empty: {e}");
                0.0
            }
        }
    }

    fn layout_node(
        &self,
        node: &ContentNode,
        path: NodePath,
        x: f64,
        y: f64,
        width: f64,
        parent: Inherited,
    ) -> LayoutBox {
        if Self::is_hidden(node) {
            return LayoutBox {
                path,
                bounds: Bounds::new(y, x, width, 0.0),
                margin_top: 0.0,
                margin_bottom: 0.0,
                padding_top: 0.0,
                collapse_through: false,
                hidden: true,
                unbreakable: node.is_unbreakable(),
                isolated: node.isolated_markup().is_some(),
                children: vec![],
            };
        }

        let inherited = self.inherit(node, parent);
        let padding_top = resolve(node.style.padding_top, width);
        let padding_bottom = resolve(node.style.padding_bottom, width);
        let content_top = y + padding_top;

        let (children, content_height) = match &node.kind {
            NodeKind::Text { content } => (vec![], self.text_height(content, width, inherited)),
            NodeKind::Frame { src_doc } => {
                let height = match node.style.height.and_then(|h| h.resolve(width)) {
                    Some(h) => h,
                    None => self.frame_content_height(src_doc, width),
                };
                (vec![], height)
            }
            NodeKind::Element { tag } if tag == "tr" => {
                self.layout_row(node, &path, x, content_top, width, inherited)
            }
            NodeKind::Element { .. } => {
                self.layout_flow(node, &path, x, content_top, width, padding_top, inherited)
            }
        };

        let mut height = padding_top + content_height + padding_bottom;
        if !matches!(node.kind, NodeKind::Frame { .. }) {
            if let Some(explicit) = node.style.height.and_then(|h| h.resolve(width)) {
                height = explicit;
            }
        }
        if let Some(min) = node.style.min_height.and_then(|h| h.resolve(width)) {
            height = height.max(min);
        }

        LayoutBox {
            bounds: Bounds::new(y, x, width, height),
            margin_top: resolve(node.style.margin_top, width),
            margin_bottom: resolve(node.style.margin_bottom, width),
            padding_top,
            collapse_through: Self::collapses_through(node, width),
            hidden: false,
            unbreakable: node.is_unbreakable(),
            isolated: node.isolated_markup().is_some(),
            children,
            path,
        }
    }

    /// Vertical block flow. Returns child boxes and the content height.
    #[allow(clippy::too_many_arguments)]
    fn layout_flow(
        &self,
        node: &ContentNode,
        path: &NodePath,
        x: f64,
        content_top: f64,
        width: f64,
        padding_top: f64,
        inherited: Inherited,
    ) -> (Vec<LayoutBox>, f64) {
        let mut boxes = Vec::with_capacity(node.children.len());
        let mut cursor = content_top;
        let mut pending_bottom = 0.0_f64;
        let mut first = true;

        for (i, child) in node.children.iter().enumerate() {
            let child_path = path.child(i);
            if Self::is_hidden(child) {
                boxes.push(self.layout_node(child, child_path, x, cursor, width, inherited));
                continue;
            }
            // The first child's margin already moved this box's own top edge.
            let gap = if first && padding_top == 0.0 {
                0.0
            } else {
                pending_bottom.max(self.collapsed_top(child, width))
            };
            first = false;

            let child_box = self.layout_node(child, child_path, x, cursor + gap, width, inherited);
            cursor = child_box.bounds.bottom();
            pending_bottom = child_box.margin_bottom;
            boxes.push(child_box);
        }

        (boxes, cursor + pending_bottom - content_top)
    }

    /// Table row: cells share the row width and sit side by side.
    fn layout_row(
        &self,
        node: &ContentNode,
        path: &NodePath,
        x: f64,
        content_top: f64,
        width: f64,
        inherited: Inherited,
    ) -> (Vec<LayoutBox>, f64) {
        let visible = node.children.iter().filter(|c| !Self::is_hidden(c)).count().max(1);
        let cell_width = width / visible as f64;
        let mut boxes = Vec::with_capacity(node.children.len());
        let mut tallest = 0.0_f64;
        let mut column = 0.0;

        for (i, cell) in node.children.iter().enumerate() {
            let cell_x = x + column * cell_width;
            let top = content_top + self.collapsed_top(cell, cell_width);
            let cell_box =
                self.layout_node(cell, path.child(i), cell_x, top, cell_width, inherited);
            if !cell_box.hidden {
                column += 1.0;
                let cell_bottom = cell_box.bounds.bottom() + cell_box.margin_bottom;
                tallest = tallest.max(cell_bottom - content_top);
            }
            boxes.push(cell_box);
        }
        (boxes, tallest)
    }
}

impl LayoutSurface for BlockLayout {
    fn layout(&self, root: &ContentNode, width: f64) -> LayoutResult {
        let inherited = Inherited {
            font_size: self.metrics.font_size,
            line_height: self.metrics.line_height,
        };
        // The container establishes its own formatting context: the root's
        // collapsed margin stays inside it.
        let top = self.collapsed_top(root, width);
        let root_box = self.layout_node(root, NodePath::root(), 0.0, top, width, inherited);
        let height = if root_box.hidden {
            0.0
        } else {
            root_box.bounds.bottom() + root_box.margin_bottom
        };
        LayoutResult {
            container: Bounds::new(0.0, 0.0, width, height),
            root: root_box,
        }
    }
}

fn resolve(dim: Option<crate::style::Dimension>, reference: f64) -> f64 {
    dim.and_then(|d| d.resolve(reference)).unwrap_or(0.0)
}
