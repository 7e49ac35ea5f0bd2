//! # Box Measurement
//!
//! Turns a content tree into geometry: the measurement container and one box
//! per unbreakable element. Content behind an isolation boundary runs its own
//! layout, so it is measured separately through an [`IsolationHost`]: the
//! embedded markup is loaded into a detached surface, every unbreakable node
//! inside is measured, and the surface is torn down.
//!
//! Besides bounds, each box carries its *existing top margin*: the collapsed
//! margin that already sits above its border edge. A margin adjustment
//! replaces that margin rather than adding to it, so the analyzer needs to
//! know what it is replacing.

mod host;

pub use host::{IsolatedSurface, IsolationHost, MarkupHost, MarkupSurface};

use crate::config::IsolationConfig;
use crate::error::HostError;
use crate::layout::{LayoutBox, LayoutSurface};
use crate::model::{Bounds, ContentNode, NodePath};
use crate::registry::find_unbreakable;

/// Geometry of one measured node.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBox {
    pub path: NodePath,
    pub bounds: Bounds,
    pub existing_top_margin: f64,
}

/// An unbreakable element of the main tree, measured in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredElement {
    pub path: NodePath,
    pub bounds: Bounds,
    pub existing_top_margin: f64,
    /// Embedded markup when the element is an isolation boundary.
    pub isolated_markup: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub container: Bounds,
    /// Visible unbreakable elements, in document order.
    pub elements: Vec<MeasuredElement>,
}

impl Measurement {
    /// Scroll height of the measurement container.
    pub fn content_height(&self) -> f64 {
        self.container.height
    }
}

/// Lay out `tree` at `width` and measure every unbreakable element.
///
/// Hidden elements have no geometry and are left out.
pub fn measure(surface: &impl LayoutSurface, tree: &ContentNode, width: f64) -> Measurement {
    let result = surface.layout(tree, width);
    let elements = find_unbreakable(tree)
        .into_iter()
        .filter_map(|element| {
            let layout_box = result.root.find(&element.path)?;
            if layout_box.hidden {
                return None;
            }
            Some(MeasuredElement {
                bounds: layout_box.bounds,
                existing_top_margin: existing_top_margin(&result.root, &element.path)?,
                path: element.path,
                isolated_markup: element.isolated_markup,
            })
        })
        .collect();

    Measurement {
        container: result.container,
        elements,
    }
}

/// The top margin of `node` after collapsing with its first visible
/// descendants.
pub fn effective_top_margin(node: &LayoutBox) -> f64 {
    if !node.collapse_through {
        return node.margin_top;
    }
    match node.first_visible_child() {
        Some(first) => node.margin_top.max(effective_top_margin(first)),
        None => node.margin_top,
    }
}

/// The collapsed margin above the border edge of the node at `path`.
///
/// A previous visible sibling contributes its bottom margin. A first child
/// of a parent it collapses through shares the parent's margin.
pub fn existing_top_margin(root: &LayoutBox, path: &NodePath) -> Option<f64> {
    let mut existing = effective_top_margin(root);
    let mut parent = root;
    for &idx in path.indices() {
        let node = parent.children.get(idx)?;
        let previous = parent.children[..idx].iter().rev().find(|c| !c.hidden);
        existing = match previous {
            Some(sibling) => sibling.margin_bottom.max(effective_top_margin(node)),
            None if parent.collapse_through => existing,
            None => effective_top_margin(node),
        };
        parent = node;
    }
    Some(existing)
}

/// Measure the unbreakable nodes inside an isolated document.
///
/// Bounds are relative to the isolated document; the caller offsets them by
/// the boundary's own position. The surface is dropped (torn down) before
/// this returns, whatever the outcome.
pub async fn try_measure_isolated<H: IsolationHost>(
    host: &H,
    markup: &str,
    width: f64,
    config: &IsolationConfig,
) -> Result<Vec<ElementBox>, HostError> {
    let surface = tokio::time::timeout(config.load_timeout(), host.load(markup, width))
        .await
        .map_err(|_| HostError::Timeout(config.load_timeout()))??;

    if !config.settle_delay().is_zero() {
        tokio::time::sleep(config.settle_delay()).await;
    }

    let document = surface.document()?;
    drop(surface);

    let mut boxes = Vec::new();
    collect_unbreakable(&document.root, &document.root, &mut boxes);
    Ok(boxes)
}

/// Like [`try_measure_isolated`], but an unmeasurable document yields no
/// boxes: "no data" means "assume nothing spans" for that region.
pub async fn measure_isolated<H: IsolationHost>(
    host: &H,
    markup: &str,
    width: f64,
    config: &IsolationConfig,
) -> Vec<ElementBox> {
    match try_measure_isolated(host, markup, width, config).await {
        Ok(boxes) => boxes,
        Err(e) => {
            log::warn!("isolated content not measured: {e}");
            Vec::new()
        }
    }
}

fn collect_unbreakable(root: &LayoutBox, node: &LayoutBox, out: &mut Vec<ElementBox>) {
    if node.hidden {
        return;
    }
    if node.unbreakable {
        if let Some(existing) = existing_top_margin(root, &node.path) {
            out.push(ElementBox {
                path: node.path.clone(),
                bounds: node.bounds,
                existing_top_margin: existing,
            });
        }
    }
    // Nested boundaries stay opaque.
    if node.isolated {
        return;
    }
    for child in &node.children {
        collect_unbreakable(root, child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BlockLayout;
    use crate::markup::parse_markup;
    use crate::style::{Dimension, Style};

    fn fast() -> IsolationConfig {
        IsolationConfig {
            load_timeout_ms: 1000,
            settle_delay_ms: 0,
        }
    }

    struct Restricted;

    struct Opaque;

    impl IsolatedSurface for Opaque {
        fn document(&self) -> Result<crate::layout::LayoutResult, HostError> {
            Err(HostError::Unintrospectable("cross-origin".to_string()))
        }
    }

    impl IsolationHost for Restricted {
        type Surface = Opaque;

        async fn load(&self, _markup: &str, _width: f64) -> Result<Opaque, HostError> {
            Ok(Opaque)
        }
    }

    struct NeverReady;

    impl IsolationHost for NeverReady {
        type Surface = Opaque;

        async fn load(&self, _markup: &str, _width: f64) -> Result<Opaque, HostError> {
            std::future::pending().await
        }
    }

    fn sized(height: f64, top: f64, bottom: f64) -> ContentNode {
        ContentNode::element("div", vec![]).with_style(Style {
            height: Some(Dimension::Px(height)),
            margin_top: Some(Dimension::Px(top)),
            margin_bottom: Some(Dimension::Px(bottom)),
            ..Default::default()
        })
    }

    #[test]
    fn measures_unbreakables_in_order() {
        let tree = ContentNode::element(
            "div",
            vec![
                sized(100.0, 0.0, 0.0),
                sized(50.0, 0.0, 0.0).unbreakable(),
                sized(30.0, 0.0, 0.0).unbreakable(),
            ],
        );
        let m = measure(&BlockLayout::default(), &tree, 600.0);
        assert_eq!(m.content_height(), 180.0);
        assert_eq!(m.elements.len(), 2);
        assert_eq!(m.elements[0].bounds.top, 100.0);
        assert_eq!(m.elements[1].bounds.top, 150.0);
    }

    #[test]
    fn existing_margin_is_the_collapsed_gap() {
        let tree = ContentNode::element(
            "div",
            vec![sized(100.0, 0.0, 30.0), sized(50.0, 12.0, 0.0).unbreakable()],
        );
        let m = measure(&BlockLayout::default(), &tree, 600.0);
        assert_eq!(m.elements[0].existing_top_margin, 30.0);
        assert_eq!(m.elements[0].bounds.top, 130.0);
    }

    #[test]
    fn existing_margin_follows_collapse_through_parents() {
        let inner = sized(40.0, 25.0, 0.0).unbreakable();
        let outer = ContentNode::element("section", vec![inner]).with_style(Style {
            margin_top: Some(Dimension::Px(10.0)),
            ..Default::default()
        });
        let tree = ContentNode::element("div", vec![sized(100.0, 0.0, 5.0), outer]);
        let m = measure(&BlockLayout::default(), &tree, 600.0);
        assert_eq!(m.elements[0].existing_top_margin, 25.0);
        assert_eq!(m.elements[0].bounds.top, 125.0);
    }

    #[test]
    fn effective_margin_takes_the_first_descendant() {
        let tree = parse_markup(
            r#"<div style="margin-top: 4px"><p style="margin-top: 18px; height: 10px"></p></div>"#,
        )
        .unwrap();
        let result = BlockLayout::default().layout(&tree, 600.0);
        assert_eq!(effective_top_margin(&result.root), 18.0);
    }

    #[test]
    fn hidden_unbreakables_are_skipped() {
        let hidden = ContentNode::element("div", vec![])
            .with_style(Style::parse_inline("display: none; height: 10px"))
            .unbreakable();
        let tree = ContentNode::element("div", vec![hidden]);
        let m = measure(&BlockLayout::default(), &tree, 600.0);
        assert!(m.elements.is_empty());
    }

    #[tokio::test]
    async fn isolated_documents_are_measured_inside() {
        let host = MarkupHost::new(BlockLayout::default());
        let markup = r#"<div><div style="height: 300px"></div>
            <div class="skrift-unbreakable" style="height: 80px; margin-top: 16px"></div></div>"#;
        let boxes = measure_isolated(&host, markup, 600.0, &fast()).await;
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].bounds.top, 316.0);
        assert_eq!(boxes[0].existing_top_margin, 16.0);
    }

    #[tokio::test]
    async fn unintrospectable_documents_yield_nothing() {
        let markup = r#"<div class="skrift-unbreakable"></div>"#;
        let err = try_measure_isolated(&Restricted, markup, 600.0, &fast())
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Unintrospectable(_)));
        assert!(measure_isolated(&Restricted, markup, 600.0, &fast()).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_is_bounded() {
        let err = try_measure_isolated(&NeverReady, "<div></div>", 600.0, &fast())
            .await
            .unwrap_err();
        assert_eq!(err, HostError::Timeout(std::time::Duration::from_secs(1)));
    }
}
