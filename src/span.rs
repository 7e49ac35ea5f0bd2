//! # Page-Span Analysis
//!
//! Decides which measured elements straddle a page boundary and how much top
//! margin would push each of them onto the next page.
//!
//! Page numbers are 1-based. For an element at `top` (relative to the
//! container) with height `h`:
//!
//! ```text
//! start_page = floor(top / page_height) + 1
//! end_page   = floor((top + h - 1) / page_height) + 1
//! ```
//!
//! A spanning element on page `p` needs `p * page_height - top` more pixels
//! above it. The margin written back is that amount plus the margin already
//! sitting above the element, because the new value replaces it.

use std::collections::BTreeMap;

use crate::model::{Bounds, NodePath};

/// Positions are snapped to this many fractional digits before paging, so
/// floating-point noise never moves an element onto the wrong page.
const SNAP: f64 = 1e6;

/// Which pages an element overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanInfo {
    pub spans_multiple_pages: bool,
    pub start_page: u32,
    pub end_page: u32,
}

fn snap(value: f64) -> f64 {
    (value * SNAP).round() / SNAP
}

fn page_of(offset: f64, page_height: f64) -> u32 {
    (offset / page_height).floor().max(0.0) as u32 + 1
}

/// The pages `bounds` covers inside `container`.
pub fn span_of(bounds: &Bounds, container: &Bounds, page_height: f64) -> SpanInfo {
    let relative_top = snap(bounds.top - container.top);
    let start_page = page_of(relative_top, page_height);
    let end_page = if bounds.height > 0.0 {
        page_of(snap(relative_top + bounds.height - 1.0), page_height).max(start_page)
    } else {
        start_page
    };
    SpanInfo {
        spans_multiple_pages: start_page != end_page,
        start_page,
        end_page,
    }
}

/// A spanning element, with its position in the input list.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanning {
    pub index: usize,
    pub bounds: Bounds,
    pub span: SpanInfo,
}

/// The elements of `bounds` that cross at least one page boundary.
pub fn analyze_spans(bounds: &[Bounds], container: &Bounds, page_height: f64) -> Vec<Spanning> {
    bounds
        .iter()
        .enumerate()
        .filter_map(|(index, b)| {
            let span = span_of(b, container, page_height);
            span.spans_multiple_pages.then_some(Spanning {
                index,
                bounds: *b,
                span,
            })
        })
        .collect()
}

/// Pixels needed to move an element starting on `span.start_page` to the top
/// of the following page.
pub fn base_margin(relative_top: f64, span: &SpanInfo, page_height: f64) -> f64 {
    span.start_page as f64 * page_height - relative_top
}

/// An element considered for a margin adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Path of the element. For isolated content this is the path inside the
    /// embedded document.
    pub path: NodePath,
    /// Bounds in the main container's coordinate space.
    pub bounds: Bounds,
    pub existing_top_margin: f64,
    /// The isolation boundary holding this element, if any.
    pub boundary: Option<NodePath>,
}

/// Why a spanning element was left where it is.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Taller than a page: no margin can make it fit.
    Oversized { height: f64 },
    /// The margin it would need exceeds a page.
    AdjustmentTooLarge { adjustment: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub path: NodePath,
    pub boundary: Option<NodePath>,
    pub span: SpanInfo,
    pub reason: RejectReason,
}

/// The margin adjustments for one analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarginPlan {
    /// New top margins for main-tree elements.
    pub margins: BTreeMap<NodePath, f64>,
    /// New top margins per isolation boundary. One value per boundary: the
    /// largest requirement among its unbreakable children.
    pub isolated_margins: BTreeMap<NodePath, f64>,
    pub rejected: Vec<Rejection>,
}

impl MarginPlan {
    /// True when there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.margins.is_empty() && self.isolated_margins.is_empty()
    }
}

/// Plan the adjustments for `candidates`, given in document order.
///
/// Each accepted push moves every later element down, so candidates are
/// evaluated at their shifted positions.
pub fn plan_margins(candidates: &[Candidate], container: &Bounds, page_height: f64) -> MarginPlan {
    let mut plan = MarginPlan::default();
    let mut shift = 0.0;
    let mut boundary_push: BTreeMap<NodePath, f64> = BTreeMap::new();

    for candidate in candidates {
        let bounds = candidate.bounds.offset_y(shift);
        let span = span_of(&bounds, container, page_height);
        if !span.spans_multiple_pages {
            continue;
        }

        let reject = |reason| Rejection {
            path: candidate.path.clone(),
            boundary: candidate.boundary.clone(),
            span,
            reason,
        };

        if bounds.height > page_height {
            log::warn!(
                "element {} is taller than a page ({}px > {page_height}px), leaving it in place",
                candidate.path,
                bounds.height
            );
            plan.rejected.push(reject(RejectReason::Oversized {
                height: bounds.height,
            }));
            continue;
        }

        let base = base_margin(snap(bounds.top - container.top), &span, page_height);
        let adjustment = base + candidate.existing_top_margin;
        if adjustment > page_height {
            log::warn!(
                "element {} would need a {adjustment}px margin, more than a page",
                candidate.path
            );
            plan.rejected.push(reject(RejectReason::AdjustmentTooLarge { adjustment }));
            continue;
        }

        log::trace!(
            "element {} spans pages {}..={}, margin-top {adjustment}px",
            candidate.path,
            span.start_page,
            span.end_page
        );

        match &candidate.boundary {
            None => {
                plan.margins.insert(candidate.path.clone(), adjustment);
                shift += base;
            }
            Some(boundary) => {
                let margin = plan.isolated_margins.entry(boundary.clone()).or_insert(0.0);
                *margin = margin.max(adjustment);
                let pushed = boundary_push.entry(boundary.clone()).or_insert(0.0);
                if base > *pushed {
                    shift += base - *pushed;
                    *pushed = base;
                }
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> Bounds {
        Bounds::new(0.0, 0.0, 600.0, 5000.0)
    }

    fn candidate(path: Vec<usize>, top: f64, height: f64) -> Candidate {
        Candidate {
            path: NodePath::from(path),
            bounds: Bounds::new(top, 0.0, 600.0, height),
            existing_top_margin: 0.0,
            boundary: None,
        }
    }

    #[test]
    fn straddling_element_spans_two_pages() {
        let span = span_of(&Bounds::new(900.0, 0.0, 10.0, 200.0), &container(), 1000.0);
        assert_eq!(
            span,
            SpanInfo {
                spans_multiple_pages: true,
                start_page: 1,
                end_page: 2
            }
        );
    }

    #[test]
    fn element_ending_before_the_boundary_does_not_span() {
        let span = span_of(&Bounds::new(950.0, 0.0, 10.0, 40.0), &container(), 1000.0);
        assert_eq!(span.start_page, 1);
        assert_eq!(span.end_page, 1);
        assert!(!span.spans_multiple_pages);
    }

    #[test]
    fn element_ending_exactly_on_the_boundary_does_not_span() {
        let span = span_of(&Bounds::new(900.0, 0.0, 10.0, 100.0), &container(), 1000.0);
        assert!(!span.spans_multiple_pages);
    }

    #[test]
    fn empty_boxes_never_span() {
        let span = span_of(&Bounds::new(1000.0, 0.0, 10.0, 0.0), &container(), 1000.0);
        assert_eq!(span.start_page, 2);
        assert!(!span.spans_multiple_pages);
    }

    #[test]
    fn positions_are_relative_to_the_container() {
        let shifted = Bounds::new(250.0, 0.0, 600.0, 5000.0);
        let span = span_of(&Bounds::new(1100.0, 0.0, 10.0, 100.0), &shifted, 1000.0);
        assert!(!span.spans_multiple_pages);
        assert_eq!(span.start_page, 1);
    }

    #[test]
    fn analyze_keeps_original_indices() {
        let bounds = [
            Bounds::new(0.0, 0.0, 10.0, 100.0),
            Bounds::new(950.0, 0.0, 10.0, 100.0),
            Bounds::new(1100.0, 0.0, 10.0, 100.0),
            Bounds::new(1990.0, 0.0, 10.0, 20.0),
        ];
        let spanning = analyze_spans(&bounds, &container(), 1000.0);
        let indices: Vec<usize> = spanning.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn margin_pushes_to_next_page_and_adds_existing() {
        let mut c = candidate(vec![2], 900.0, 200.0);
        c.existing_top_margin = 16.0;
        let plan = plan_margins(&[c], &container(), 1000.0);
        assert_eq!(plan.margins[&NodePath::from(vec![2])], 116.0);
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn oversized_elements_are_rejected() {
        let plan = plan_margins(&[candidate(vec![0], 500.0, 1200.0)], &container(), 1000.0);
        assert!(plan.is_empty());
        assert_eq!(
            plan.rejected[0].reason,
            RejectReason::Oversized { height: 1200.0 }
        );
    }

    #[test]
    fn adjustments_over_a_page_are_rejected() {
        let mut c = candidate(vec![0], 100.0, 950.0);
        c.existing_top_margin = 150.0;
        let plan = plan_margins(&[c], &container(), 1000.0);
        assert!(plan.is_empty());
        assert_eq!(
            plan.rejected[0].reason,
            RejectReason::AdjustmentTooLarge { adjustment: 1050.0 }
        );
    }

    #[test]
    fn later_elements_see_earlier_pushes() {
        // Pushing the first element by 100px moves the second from
        // 1950..2000 to 2050..2100, which no longer spans.
        let plan = plan_margins(
            &[candidate(vec![0], 900.0, 200.0), candidate(vec![1], 1950.0, 100.0)],
            &container(),
            1000.0,
        );
        assert_eq!(plan.margins.len(), 1);
        assert_eq!(plan.margins[&NodePath::from(vec![0])], 100.0);
    }

    #[test]
    fn isolated_children_share_one_margin() {
        let boundary = NodePath::from(vec![3]);
        let inner = |path: Vec<usize>, top: f64| Candidate {
            boundary: Some(boundary.clone()),
            ..candidate(path, top, 100.0)
        };
        let plan = plan_margins(
            &[inner(vec![0], 980.0), inner(vec![4], 2950.0)],
            &container(),
            1000.0,
        );
        assert!(plan.margins.is_empty());
        // 20px for the first, then 2970..3070 needs 30px.
        assert_eq!(plan.isolated_margins[&boundary], 30.0);
    }
}
