//! # Flow Distribution
//!
//! The alternative to sliding viewports: hand the root's children out to
//! pages one by one, so each page holds only what it shows.
//!
//! The rules:
//!
//! 1. A block that fits in the space left on the page is placed.
//! 2. A block that does not fit but would fit on an empty page moves to the
//!    next page.
//! 3. A block taller than a page is split between its children: the children
//!    that fit stay, the rest continue on the next page inside a shallow copy
//!    of the block. If not even the first child fits, the first child is
//!    distributed on its own.
//! 4. Unbreakable blocks and blocks without children are never split. When
//!    they are taller than a page they are shown as viewport slices, one page
//!    per `page_height` of content.

use std::collections::VecDeque;

use crate::layout::LayoutSurface;
use crate::model::{ContentNode, NodeKind, PageSize};

/// Where a block goes when the current page may be too short for it.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// The children fit in the space left on this page.
    Place,
    /// Nothing can stay here; the block opens the next page.
    MoveToNextPage,
    /// A leading run of children stays here and the rest of the block
    /// continues on the next page.
    Split {
        /// Length of the run that stays.
        items_on_current_page: usize,
    },
}

/// Choose a [`BreakDecision`] for a block whose children are
/// `child_heights` tall, with `remaining_height` left on the page.
///
/// Unbreakable blocks either fit or move; breakable ones keep the longest
/// prefix of children that fits.
pub fn decide_break(
    remaining_height: f64,
    child_heights: &[f64],
    is_breakable: bool,
) -> BreakDecision {
    if child_heights.iter().sum::<f64>() <= remaining_height {
        return BreakDecision::Place;
    }
    if !is_breakable {
        return BreakDecision::MoveToNextPage;
    }

    let kept = child_heights
        .iter()
        .scan(0.0, |used, &h| {
            *used += h;
            (*used <= remaining_height).then_some(())
        })
        .count();
    match kept {
        0 => BreakDecision::MoveToNextPage,
        n => BreakDecision::Split {
            items_on_current_page: n,
        },
    }
}

/// A block on a distributed page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBlock {
    Whole(ContentNode),
    /// A window onto a block taller than a page, starting `offset` pixels
    /// into it.
    Slice { node: ContentNode, offset: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributedPage {
    /// 1-based page number.
    pub index: usize,
    pub blocks: Vec<PageBlock>,
}

struct Pages {
    done: Vec<DistributedPage>,
    current: Vec<PageBlock>,
    used: f64,
}

impl Pages {
    fn flush(&mut self) {
        let blocks = std::mem::take(&mut self.current);
        self.done.push(DistributedPage {
            index: self.done.len() + 1,
            blocks,
        });
        self.used = 0.0;
    }

    fn place(&mut self, block: PageBlock, height: f64) {
        self.current.push(block);
        self.used += height;
    }
}

/// Distribute the children of `root` over pages of `page` size.
pub fn distribute(
    surface: &impl LayoutSurface,
    root: &ContentNode,
    page: PageSize,
) -> Vec<DistributedPage> {
    let (width, page_height) = page.dimensions();
    let height_of = |node: &ContentNode| surface.layout(node, width).content_height();

    let mut pages = Pages {
        done: Vec::new(),
        current: Vec::new(),
        used: 0.0,
    };
    let mut queue: VecDeque<ContentNode> = root
        .children
        .iter()
        .filter(|c| !c.style.is_hidden())
        .cloned()
        .collect();

    while let Some(node) = queue.pop_front() {
        let height = height_of(&node);
        let remaining = page_height - pages.used;
        if height <= remaining {
            pages.place(PageBlock::Whole(node), height);
            continue;
        }
        if height <= page_height {
            pages.flush();
            pages.place(PageBlock::Whole(node), height);
            continue;
        }

        let breakable = matches!(node.kind, NodeKind::Element { .. })
            && !node.is_unbreakable()
            && !node.children.is_empty();
        let child_heights: Vec<f64> = node.children.iter().map(|c| height_of(c)).collect();

        match decide_break(remaining, &child_heights, breakable) {
            BreakDecision::Split {
                items_on_current_page,
            } => {
                let (first, rest) = split_at(&node, items_on_current_page);
                let first_height = child_heights[..items_on_current_page].iter().sum();
                pages.place(PageBlock::Whole(first), first_height);
                pages.flush();
                queue.push_front(rest);
            }
            BreakDecision::MoveToNextPage | BreakDecision::Place if !pages.current.is_empty() => {
                pages.flush();
                queue.push_front(node);
            }
            _ if breakable => {
                // Not even the first child fits on an empty page.
                let (first, rest) = split_at(&node, 1);
                if !rest.children.is_empty() {
                    queue.push_front(rest);
                }
                for child in first.children.into_iter().rev() {
                    queue.push_front(child);
                }
            }
            _ => {
                log::debug!(
                    "{} block of {height}px shown as {} slice(s)",
                    node.tag(),
                    (height / page_height).ceil()
                );
                let slices = (height / page_height).ceil() as usize;
                for i in 0..slices {
                    if i > 0 || !pages.current.is_empty() {
                        pages.flush();
                    }
                    let shown = (height - i as f64 * page_height).min(page_height);
                    pages.place(
                        PageBlock::Slice {
                            node: node.clone(),
                            offset: i as f64 * page_height,
                        },
                        shown,
                    );
                }
            }
        }
    }

    if !pages.current.is_empty() || pages.done.is_empty() {
        pages.flush();
    }
    pages.done
}

/// Shallow copies of `node` holding the first `at` children and the rest.
fn split_at(node: &ContentNode, at: usize) -> (ContentNode, ContentNode) {
    let mut first = node.clone_shallow();
    let mut rest = node.clone_shallow();
    first.children = node.children[..at].to_vec();
    rest.children = node.children[at..].to_vec();
    (first, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BlockLayout;
    use crate::style::{Dimension, Style};

    fn block(height: f64) -> ContentNode {
        ContentNode::element("div", vec![]).with_style(Style {
            height: Some(Dimension::Px(height)),
            ..Default::default()
        })
    }

    fn page() -> PageSize {
        PageSize::Custom {
            width: 400.0,
            height: 1000.0,
        }
    }

    fn heights(page: &DistributedPage) -> Vec<f64> {
        page.blocks
            .iter()
            .map(|b| match b {
                PageBlock::Whole(n) | PageBlock::Slice { node: n, .. } => {
                    BlockLayout::default().layout(n, 400.0).content_height()
                }
            })
            .collect()
    }

    #[test]
    fn short_block_stays_on_the_page() {
        assert_eq!(decide_break(90.0, &[45.0, 45.0], false), BreakDecision::Place);
    }

    #[test]
    fn unbreakable_block_opens_the_next_page() {
        assert_eq!(
            decide_break(400.0, &[300.0, 300.0], false),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn breakable_block_keeps_the_prefix_that_fits() {
        let decision = decide_break(650.0, &[300.0, 300.0, 300.0, 10.0], true);
        assert_eq!(
            decision,
            BreakDecision::Split {
                items_on_current_page: 2
            }
        );
    }

    #[test]
    fn tall_first_child_moves_the_whole_block() {
        assert_eq!(
            decide_break(200.0, &[250.0, 10.0], true),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn empty_document_is_one_empty_page() {
        let empty = ContentNode::element("div", vec![]);
        let pages = distribute(&BlockLayout::default(), &empty, page());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].blocks.is_empty());
    }

    #[test]
    fn blocks_that_do_not_fit_move_whole() {
        let root = ContentNode::element("div", vec![block(600.0), block(600.0), block(300.0)]);
        let pages = distribute(&BlockLayout::default(), &root, page());
        assert_eq!(pages.len(), 2);
        assert_eq!(heights(&pages[0]), vec![600.0]);
        assert_eq!(heights(&pages[1]), vec![600.0, 300.0]);
        assert_eq!(pages[1].index, 2);
    }

    #[test]
    fn tall_sections_split_between_children() {
        let section = ContentNode::element("section", (0..5).map(|_| block(300.0)).collect());
        let root = ContentNode::element("div", vec![block(200.0), section]);
        let pages = distribute(&BlockLayout::default(), &root, page());
        assert_eq!(pages.len(), 2);
        // 200 + two 300px children on the first page, the other three after.
        assert_eq!(heights(&pages[0]), vec![200.0, 600.0]);
        assert_eq!(heights(&pages[1]), vec![900.0]);
        match &pages[1].blocks[0] {
            PageBlock::Whole(rest) => {
                assert_eq!(rest.tag(), "section");
                assert_eq!(rest.children.len(), 3);
            }
            other => panic!("expected the rest of the section, got {other:?}"),
        }
    }

    #[test]
    fn tall_unbreakables_become_slices() {
        let root = ContentNode::element(
            "div",
            vec![block(100.0), block(2500.0).unbreakable(), block(100.0)],
        );
        let pages = distribute(&BlockLayout::default(), &root, page());
        assert_eq!(pages.len(), 4);
        let offsets: Vec<f64> = pages[1..]
            .iter()
            .filter_map(|p| match &p.blocks[0] {
                PageBlock::Slice { offset, .. } => Some(*offset),
                PageBlock::Whole(_) => None,
            })
            .collect();
        assert_eq!(offsets, vec![0.0, 1000.0, 2000.0]);
        // The last slice shows 500px, leaving room for the trailing block.
        assert_eq!(pages[3].blocks.len(), 2);
    }

    #[test]
    fn oversized_first_child_is_distributed_on_its_own() {
        let inner = ContentNode::element("div", vec![block(700.0), block(700.0)]);
        let outer = ContentNode::element("section", vec![inner, block(100.0)]);
        let root = ContentNode::element("div", vec![outer]);
        let pages = distribute(&BlockLayout::default(), &root, page());
        assert_eq!(pages.len(), 2);
        assert_eq!(heights(&pages[0]), vec![700.0]);
        assert_eq!(heights(&pages[1]), vec![700.0, 100.0]);
    }
}
