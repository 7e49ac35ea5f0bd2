//! # Unbreakable Registry
//!
//! Finds the nodes that must not be split across a page boundary. The list is
//! rebuilt from scratch on every measurement pass; paths are the only
//! identity and they are only meaningful for the tree they were read from.

use crate::model::{ContentNode, NodePath};

/// A node that must end up entirely on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct UnbreakableElement {
    pub path: NodePath,
    /// True for isolation boundaries. Their unbreakable content lives inside
    /// `isolated_markup` and is measured separately.
    pub is_isolated: bool,
    pub isolated_markup: Option<String>,
}

/// Collect unbreakable nodes in document order.
///
/// Isolation boundaries are opaque: they are always reported (their interior
/// may hold unbreakable content the main tree cannot see) and never descended
/// into.
pub fn find_unbreakable(tree: &ContentNode) -> Vec<UnbreakableElement> {
    let mut found = Vec::new();
    visit(tree, NodePath::root(), &mut found);
    log::trace!("registry: {} unbreakable element(s)", found.len());
    found
}

fn visit(node: &ContentNode, path: NodePath, found: &mut Vec<UnbreakableElement>) {
    if let Some(markup) = node.isolated_markup() {
        found.push(UnbreakableElement {
            path,
            is_isolated: true,
            isolated_markup: Some(markup.to_string()),
        });
        return;
    }

    if node.is_unbreakable() {
        found.push(UnbreakableElement {
            path: path.clone(),
            is_isolated: false,
            isolated_markup: None,
        });
    }

    for (i, child) in node.children.iter().enumerate() {
        visit(child, path.child(i), found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;

    #[test]
    fn document_order_and_nesting() {
        let tree = ContentNode::element(
            "div",
            vec![
                ContentNode::element("p", vec![]),
                ContentNode::element("div", vec![ContentNode::element("p", vec![]).unbreakable()])
                    .unbreakable(),
                ContentNode::element("p", vec![]).unbreakable(),
            ],
        );
        let paths: Vec<String> = find_unbreakable(&tree)
            .into_iter()
            .map(|e| e.path.to_string())
            .collect();
        assert_eq!(paths, vec!["1", "1-0", "2"]);
    }

    #[test]
    fn frames_are_opaque_units() {
        let tree = ContentNode::element(
            "div",
            vec![ContentNode::frame(r#"<div class="skrift-unbreakable">x</div>"#)],
        );
        let found = find_unbreakable(&tree);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_isolated);
        assert_eq!(found[0].path, NodePath::from(vec![0]));
        assert!(found[0].isolated_markup.as_deref().unwrap().contains("skrift-unbreakable"));
    }

    #[test]
    fn same_tree_same_paths() {
        let tree = parse_markup(
            r#"<main><section data-unbreakable="true"><p>a</p></section>
               <p style="break-inside: avoid">b</p></main>"#,
        )
        .unwrap();
        assert_eq!(find_unbreakable(&tree), find_unbreakable(&tree));
        assert_eq!(find_unbreakable(&tree).len(), 2);
    }

    #[test]
    fn root_can_be_unbreakable() {
        let tree = ContentNode::element("div", vec![]).unbreakable();
        assert_eq!(find_unbreakable(&tree)[0].path, NodePath::root());
    }
}
