//! Page frames: sliding viewports over one shared content tree.

use std::sync::Arc;

use crate::markup::to_markup;
use crate::model::ContentNode;
use crate::style::Style;
use crate::table::HeaderOverlay;

/// One output page.
///
/// Every page shows the same tree. Page `n` translates it up by
/// `(n - 1) * height` and clips it to the page box.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub index: usize,
    pub width: f64,
    pub height: f64,
    /// Vertical offset of this page into the content.
    pub offset: f64,
    pub content: Arc<ContentNode>,
    /// Table headers composited at the top of this page.
    pub header_overlays: Vec<HeaderOverlay>,
}

impl Page {
    /// The content wrapped in a translated container, ready to be placed in
    /// a clipping box of the page's size.
    pub fn viewport(&self) -> ContentNode {
        let style = Style::default()
            .with_declaration("transform", &format!("translateY(-{}px)", self.offset))
            .with_declaration("width", "100%")
            .with_declaration("position", "relative");
        ContentNode::element("div", vec![(*self.content).clone()]).with_style(style)
    }

    /// A standalone document showing exactly this page.
    pub fn to_markup(&self) -> String {
        let mut body = to_markup(&self.viewport());
        for overlay in &self.header_overlays {
            let pinned = ContentNode::element("div", vec![overlay.content.clone()]).with_style(
                Style::default()
                    .with_declaration("position", "absolute")
                    .with_declaration("top", "0")
                    .with_declaration("left", "0")
                    .with_declaration("width", "100%"),
            );
            body.push_str(&to_markup(&pinned));
        }
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/></head>\
             <body style=\"margin: 0; width: {}px; height: {}px; overflow: hidden; position: relative\">{body}</body></html>",
            self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodePath;

    fn page(index: usize) -> Page {
        Page {
            index,
            width: 794.0,
            height: 1123.0,
            offset: (index - 1) as f64 * 1123.0,
            content: Arc::new(ContentNode::element("p", vec![ContentNode::text("hello")])),
            header_overlays: vec![],
        }
    }

    #[test]
    fn viewport_translates_by_the_page_offset() {
        let viewport = page(3).viewport();
        let style = viewport.style.to_inline();
        assert!(style.contains("transform: translateY(-2246px)"));
        assert!(style.contains("position: relative"));
        assert_eq!(viewport.children[0].text_content(), "hello");
    }

    #[test]
    fn markup_clips_to_the_page_box() {
        let html = page(1).to_markup();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("width: 794px; height: 1123px; overflow: hidden"));
        assert!(html.contains("translateY(-0px)"));
        assert!(html.contains("<p>hello</p>"));
    }

    #[test]
    fn overlays_are_pinned_to_the_top() {
        let mut p = page(2);
        p.header_overlays.push(HeaderOverlay {
            table: NodePath::from(vec![1]),
            offset_in_table: 200.0,
            content: ContentNode::element("table", vec![ContentNode::element("thead", vec![])]),
        });
        let html = p.to_markup();
        assert!(html.contains("position: absolute; top: 0; left: 0; width: 100%"));
        assert!(html.contains("<thead></thead>"));
    }
}
