//! # Table Header Repetition
//!
//! Finds tables whose body runs across a page boundary and works out where
//! their header has to reappear.
//!
//! Spanning tables are identified from a height *estimate*, not from
//! measurement: every row counts as one average row, and the content before
//! a table is sized with per-tag heuristics. Headers are not copied into the
//! tree. Each continuation page gets the header as an overlay pinned to its
//! top, so repeated headers never feed back into the next measurement.

use crate::config::EstimateConfig;
use crate::model::{ContentNode, NodeKind, NodePath};
use crate::span::SpanInfo;
use crate::style::Dimension;

/// Attribute marking a row as a header row outside `thead`.
pub const HEADER_ROW_ATTR: &str = "data-is-header";
/// Class marking a row as a header row outside `thead`.
pub const HEADER_ROW_CLASS: &str = "skrift-table-header-row";

/// A table whose estimated extent crosses at least one page boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpan {
    pub table: NodePath,
    /// The `thead`, or the first header row when there is no `thead`.
    pub header: Option<NodePath>,
    pub header_rows: usize,
    pub body_rows: usize,
    pub estimated_top: f64,
    pub estimated_height: f64,
    pub span: SpanInfo,
    /// Offsets within the table at which each following page begins.
    pub page_breaks: Vec<f64>,
}

impl TableSpan {
    /// Pages (1-based) on which the header has to be repeated, with the
    /// offset inside the table where each of them starts.
    pub fn continuation_pages(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        (self.span.start_page + 1..=self.span.end_page).zip(self.page_breaks.iter().copied())
    }
}

/// A header repeated at the top of a continuation page.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderOverlay {
    pub table: NodePath,
    /// Offset within the table at which the page begins.
    pub offset_in_table: f64,
    /// A `table` element holding only the header, carrying the original
    /// table's attributes so column styling still applies.
    pub content: ContentNode,
}

/// Tables that span pages, in document order.
pub fn find_spanning_tables(
    tree: &ContentNode,
    page_height: f64,
    estimate: &EstimateConfig,
) -> Vec<TableSpan> {
    let mut walker = Estimator {
        page_height,
        estimate,
        found: Vec::new(),
    };
    walker.height(tree, NodePath::root(), 0.0);
    walker.found
}

/// Header overlays for every spanning table with a header, keyed by page.
pub fn header_overlays(tree: &ContentNode, spans: &[TableSpan]) -> Vec<(u32, HeaderOverlay)> {
    let mut overlays = Vec::new();
    for span in spans {
        let Some(header_path) = &span.header else {
            continue;
        };
        let (Some(table), Some(header)) = (tree.at(&span.table), tree.at(header_path)) else {
            continue;
        };
        let header = if header.tag() == "tr" {
            ContentNode::element("thead", vec![header.clone()])
        } else {
            header.clone()
        };
        let content = ContentNode {
            children: vec![header],
            ..table.clone()
        };
        for (page, offset) in span.continuation_pages() {
            overlays.push((
                page,
                HeaderOverlay {
                    table: span.table.clone(),
                    offset_in_table: offset,
                    content: content.clone(),
                },
            ));
        }
    }
    overlays
}

fn is_header_row(row: &ContentNode) -> bool {
    row.has_class(HEADER_ROW_CLASS)
        || row
            .attributes
            .get(HEADER_ROW_ATTR)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[derive(Debug, Default)]
struct Rows {
    header: usize,
    body: usize,
    header_path: Option<NodePath>,
}

/// Count the rows of a table, without entering nested tables.
fn count_rows(node: &ContentNode, path: &NodePath, in_thead: bool, rows: &mut Rows) {
    for (i, child) in node.children.iter().enumerate() {
        let child_path = path.child(i);
        match child.tag() {
            "table" => {}
            "thead" => {
                if rows.header_path.is_none() {
                    rows.header_path = Some(child_path.clone());
                }
                count_rows(child, &child_path, true, rows);
            }
            "tr" if in_thead || is_header_row(child) => {
                rows.header += 1;
                if rows.header_path.is_none() {
                    rows.header_path = Some(child_path);
                }
            }
            "tr" => rows.body += 1,
            _ => count_rows(child, &child_path, in_thead, rows),
        }
    }
}

struct Estimator<'a> {
    page_height: f64,
    estimate: &'a EstimateConfig,
    found: Vec<TableSpan>,
}

impl Estimator<'_> {
    /// Estimated height of `node` placed at `top`. Records spanning tables.
    fn height(&mut self, node: &ContentNode, path: NodePath, top: f64) -> f64 {
        if node.style.is_hidden() {
            return 0.0;
        }
        let explicit = match node.style.height {
            Some(Dimension::Px(px)) => Some(px),
            _ => None,
        };

        match &node.kind {
            NodeKind::Text { .. } => return 0.0,
            NodeKind::Frame { .. } => return explicit.unwrap_or(self.estimate.frame_height),
            NodeKind::Element { .. } => {}
        }

        let tag = node.tag();
        if tag == "table" {
            return self.table(node, path, top);
        }
        if let Some(height) = self.heuristic(tag) {
            return explicit.unwrap_or(height);
        }

        let mut offset = top;
        for (i, child) in node.children.iter().enumerate() {
            offset += self.height(child, path.child(i), offset);
        }
        explicit.unwrap_or(offset - top)
    }

    fn heuristic(&self, tag: &str) -> Option<f64> {
        let e = self.estimate;
        match tag {
            "h1" => Some(e.heading_heights[0]),
            "h2" => Some(e.heading_heights[1]),
            "h3" => Some(e.heading_heights[2]),
            "h4" => Some(e.heading_heights[3]),
            "h5" => Some(e.heading_heights[4]),
            "h6" => Some(e.heading_heights[5]),
            "p" | "li" | "blockquote" => Some(e.paragraph_height),
            "hr" | "img" | "pre" => Some(e.default_block_height),
            _ => None,
        }
    }

    fn table(&mut self, node: &ContentNode, path: NodePath, top: f64) -> f64 {
        let mut rows = Rows::default();
        count_rows(node, &path, false, &mut rows);
        let height = (rows.header + rows.body) as f64 * self.estimate.average_row_height;

        let ph = self.page_height;
        let first = (top / ph).floor();
        let last = ((top + height - 1.0) / ph).floor().max(first);
        if last > first {
            let page_breaks = (first as u32 + 1..=last as u32)
                .map(|k| (k as f64 * ph - top).max(0.0))
                .collect();
            log::debug!(
                "table {path} spans pages {}..={} ({} header, {} body rows)",
                first + 1.0,
                last + 1.0,
                rows.header,
                rows.body
            );
            self.found.push(TableSpan {
                table: path,
                header: rows.header_path,
                header_rows: rows.header,
                body_rows: rows.body,
                estimated_top: top,
                estimated_height: height,
                span: SpanInfo {
                    spans_multiple_pages: true,
                    start_page: first as u32 + 1,
                    end_page: last as u32 + 1,
                },
                page_breaks,
            });
        }
        height
    }
}
