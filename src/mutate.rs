//! # Layout Mutation
//!
//! Writes planned margin adjustments back into a content tree. The input
//! tree is never touched: the result is a fresh clone with the top margin
//! *replaced* at every adjusted path, so reapplying the same plan to the same
//! tree always yields the same output.

use std::collections::BTreeMap;

use crate::markup::set_marked_margin_top;
use crate::model::{ContentNode, NodeKind, NodePath};
use crate::style::Dimension;

/// Clone `tree`, overriding `margin-top` at each path in `margins` and
/// patching the embedded markup of each boundary in `isolated_margins`.
///
/// Inside an embedded document, the first unbreakable element receives the
/// margin. Markup that cannot be patched is left as it was.
pub fn apply_adjustments(
    tree: &ContentNode,
    margins: &BTreeMap<NodePath, f64>,
    isolated_margins: &BTreeMap<NodePath, f64>,
) -> ContentNode {
    rebuild(tree, NodePath::root(), margins, isolated_margins)
}

fn rebuild(
    node: &ContentNode,
    path: NodePath,
    margins: &BTreeMap<NodePath, f64>,
    isolated_margins: &BTreeMap<NodePath, f64>,
) -> ContentNode {
    let mut out = ContentNode {
        children: node
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| rebuild(child, path.child(i), margins, isolated_margins))
            .collect(),
        ..node.clone_shallow()
    };

    if let Some(&margin) = margins.get(&path) {
        out.style.set_margin_top(Dimension::Px(margin));
    }

    let isolated = isolated_margins.get(&path);
    if let (Some(&margin), NodeKind::Frame { src_doc }) = (isolated, &mut out.kind) {
        match set_marked_margin_top(src_doc, margin) {
            Ok(patched) => *src_doc = patched,
            Err(e) => log::warn!("could not patch embedded document at {path}: {e}"),
        }
    }

    out
}
