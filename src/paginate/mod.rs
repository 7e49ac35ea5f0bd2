//! # Pagination Driver
//!
//! Runs the measure → analyze → mutate loop until geometry holds still, then
//! slices the result into pages.
//!
//! ```text
//! Idle → Measuring → Analyzing → Mutating → Stabilizing → Sliced
//!            ↑                                   │
//!            └────────── height changed ─────────┘
//! ```
//!
//! Margins are computed against the caller's tree and applied at most once
//! per call, so a pass can never accumulate margins on top of margins. Each
//! call starts a new content version; a call that notices a newer version
//! after any suspension point stops with [`FolioError::Superseded`] and
//! emits nothing.

mod page;
mod stabilize;

pub use page::Page;
pub use stabilize::{next_frame, Settle, Stabilizer, HEIGHT_TOLERANCE};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::PaginationConfig;
use crate::error::{FolioError, Result};
use crate::layout::{BlockLayout, LayoutSurface};
use crate::markup::mentions_unbreakable;
use crate::measure::{measure, try_measure_isolated, IsolationHost, MarkupHost, Measurement};
use crate::model::{ContentNode, NodePath, PageSize};
use crate::mutate::apply_adjustments;
use crate::span::{plan_margins, span_of, Candidate, MarginPlan, RejectReason, Rejection};
use crate::table::{find_spanning_tables, header_overlays, TableSpan};

/// Number of pages needed to show `content_height` pixels of content.
/// Never less than one.
pub fn pages_needed(content_height: f64, page_height: f64) -> usize {
    if content_height.is_nan() || content_height <= HEIGHT_TOLERANCE || page_height <= 0.0 {
        return 1;
    }
    let pages = ((content_height - HEIGHT_TOLERANCE) / page_height).ceil();
    (pages as usize).max(1)
}

/// A degradation the driver recovered from. Pagination still produced
/// pages; these say where they are not perfect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    /// An embedded document could not be measured; its content was assumed
    /// not to span.
    Unmeasurable { boundary: NodePath, reason: String },
    /// An unbreakable element is taller than a page and overflows.
    Oversized {
        path: NodePath,
        height: f64,
        page_height: f64,
    },
    /// Pushing the element would take more than a page of margin.
    AdjustmentTooLarge {
        path: NodePath,
        adjustment: f64,
        page_height: f64,
    },
    /// An element still straddles a boundary after margins were applied.
    UnresolvedSpan {
        path: NodePath,
        start_page: u32,
        end_page: u32,
    },
    /// Geometry kept changing; pages use the last measured height.
    NonConvergent { passes: u32, last_height: f64 },
    /// A spanning table has no header to repeat.
    MissingTableHeader { table: NodePath },
}

impl Notice {
    fn rejected(rejection: &Rejection, page_height: f64) -> Notice {
        let path = rejection
            .boundary
            .clone()
            .unwrap_or_else(|| rejection.path.clone());
        match rejection.reason {
            RejectReason::Oversized { height } => Notice::Oversized {
                path,
                height,
                page_height,
            },
            RejectReason::AdjustmentTooLarge { adjustment } => Notice::AdjustmentTooLarge {
                path,
                adjustment,
                page_height,
            },
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Unmeasurable { boundary, reason } => {
                write!(f, "embedded document at {boundary} was not measured: {reason}")
            }
            Notice::Oversized {
                path,
                height,
                page_height,
            } => write!(
                f,
                "element at {path} is {height}px tall and cannot fit on a {page_height}px page"
            ),
            Notice::AdjustmentTooLarge {
                path,
                adjustment,
                page_height,
            } => write!(
                f,
                "element at {path} needs {adjustment}px of margin, more than a {page_height}px page"
            ),
            Notice::UnresolvedSpan {
                path,
                start_page,
                end_page,
            } => write!(f, "element at {path} still spans pages {start_page} to {end_page}"),
            Notice::NonConvergent {
                passes,
                last_height,
            } => write!(
                f,
                "layout did not settle after {passes} pass(es); using last height {last_height}px"
            ),
            Notice::MissingTableHeader { table } => {
                write!(f, "table at {table} spans pages but has no header to repeat")
            }
        }
    }
}

/// The outcome of a completed pagination call.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub pages: Vec<Page>,
    pub content_height: f64,
    pub page_size: PageSize,
    /// Measuring passes run.
    pub passes: u32,
    pub notices: Vec<Notice>,
    pub table_spans: Vec<TableSpan>,
    /// The final working tree every page shows.
    pub tree: Arc<ContentNode>,
}

impl Pagination {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Driver states, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Measuring,
    Analyzing,
    Mutating,
    Stabilizing,
    Sliced,
}

/// Handle that supersedes whatever pass is in flight, e.g. when the content
/// changes or the container is resized.
#[derive(Debug, Clone)]
pub struct Invalidator {
    version: Arc<AtomicU64>,
}

impl Invalidator {
    pub fn invalidate(&self) {
        let now = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("content version bumped to {now}");
    }
}

fn note(notices: &mut Vec<Notice>, notice: Notice) {
    if !notices.contains(&notice) {
        log::warn!("{notice}");
        notices.push(notice);
    }
}

/// The pagination engine.
pub struct Paginator<S, H> {
    surface: S,
    host: H,
    config: PaginationConfig,
    version: Arc<AtomicU64>,
}

/// A paginator that needs no browser: [`BlockLayout`] for the main tree and
/// for embedded documents.
pub type HeadlessPaginator = Paginator<BlockLayout, MarkupHost<BlockLayout>>;

impl HeadlessPaginator {
    pub fn headless(config: PaginationConfig) -> Self {
        Paginator::new(BlockLayout::default(), MarkupHost::new(BlockLayout::default()), config)
    }
}

impl<S: LayoutSurface, H: IsolationHost> Paginator<S, H> {
    pub fn new(surface: S, host: H, config: PaginationConfig) -> Self {
        Self {
            surface,
            host,
            config,
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn invalidator(&self) -> Invalidator {
        Invalidator {
            version: Arc::clone(&self.version),
        }
    }

    /// Change the page size. Any pass in flight is superseded.
    pub fn resize(&mut self, page_size: PageSize) {
        self.config.page_size = page_size;
        self.invalidator().invalidate();
    }

    fn ensure_current(&self, started: u64) -> Result<()> {
        let current = self.version.load(Ordering::SeqCst);
        if current != started {
            log::debug!("pass for version {started} superseded by {current}");
            return Err(FolioError::Superseded { started, current });
        }
        Ok(())
    }

    /// Paginate `tree` into pages of the configured size.
    pub async fn paginate(&self, tree: &ContentNode) -> Result<Pagination> {
        self.config.validate()?;
        let started = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let (width, page_height) = self.config.page_size.dimensions();
        let mut state = PassState::Idle;
        let mut enter = |next: PassState, pass: u32| {
            log::debug!("pass {pass}: {state:?} -> {next:?}");
            state = next;
        };

        let mut working = Arc::new(tree.clone());
        let mut notices = Vec::new();
        let mut margins_applied = false;
        let mut passes = 0;

        let (content_height, table_spans) = loop {
            passes += 1;

            enter(PassState::Measuring, passes);
            let measurement = measure(&self.surface, &working, width);
            let candidates = self.candidates(&measurement, started, &mut notices).await?;

            enter(PassState::Analyzing, passes);
            let plan = plan_margins(&candidates, &measurement.container, page_height);
            for rejection in &plan.rejected {
                note(&mut notices, Notice::rejected(rejection, page_height));
            }
            let table_spans = find_spanning_tables(&working, page_height, &self.config.estimate);

            enter(PassState::Mutating, passes);
            let mutated = !plan.is_empty() && !margins_applied;
            if mutated {
                working = Arc::new(apply_adjustments(tree, &plan.margins, &plan.isolated_margins));
                margins_applied = true;
                log::debug!(
                    "applied {} margin(s) and {} embedded margin(s)",
                    plan.margins.len(),
                    plan.isolated_margins.len()
                );
            } else if !plan.is_empty() {
                for notice in unresolved(&plan, &candidates, &measurement, page_height) {
                    note(&mut notices, notice);
                }
            }

            enter(PassState::Stabilizing, passes);
            let height = match self.stabilize(&working, width, started).await? {
                Settle::GaveUp(height) => {
                    note(
                        &mut notices,
                        Notice::NonConvergent {
                            passes,
                            last_height: height,
                        },
                    );
                    break (height, table_spans);
                }
                Settle::Settled(height) => height,
                Settle::Pending => measurement.content_height(),
            };

            let changed = (height - measurement.content_height()).abs() >= HEIGHT_TOLERANCE;
            if !changed && !mutated {
                break (height, table_spans);
            }
            if passes >= self.config.max_passes {
                note(
                    &mut notices,
                    Notice::NonConvergent {
                        passes,
                        last_height: height,
                    },
                );
                break (height, table_spans);
            }
        };

        self.ensure_current(started)?;
        enter(PassState::Sliced, passes);

        for span in table_spans.iter().filter(|s| s.header.is_none()) {
            note(
                &mut notices,
                Notice::MissingTableHeader {
                    table: span.table.clone(),
                },
            );
        }

        let mut overlays = header_overlays(&working, &table_spans);
        let count = pages_needed(content_height, page_height);
        let pages = (1..=count)
            .map(|index| {
                let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut overlays)
                    .into_iter()
                    .partition(|(page, _)| *page as usize == index);
                overlays = rest;
                Page {
                    index,
                    width,
                    height: page_height,
                    offset: (index - 1) as f64 * page_height,
                    content: Arc::clone(&working),
                    header_overlays: mine.into_iter().map(|(_, overlay)| overlay).collect(),
                }
            })
            .collect();

        log::debug!("{count} page(s) from {content_height}px of content in {passes} pass(es)");
        Ok(Pagination {
            pages,
            content_height,
            page_size: self.config.page_size,
            passes,
            notices,
            table_spans,
            tree: working,
        })
    }

    /// Everything the analyzer should look at, in document order. Embedded
    /// documents are measured here and their boxes moved into the main
    /// container's coordinates.
    async fn candidates(
        &self,
        measurement: &Measurement,
        started: u64,
        notices: &mut Vec<Notice>,
    ) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::with_capacity(measurement.elements.len());
        for element in &measurement.elements {
            let Some(markup) = &element.isolated_markup else {
                candidates.push(Candidate {
                    path: element.path.clone(),
                    bounds: element.bounds,
                    existing_top_margin: element.existing_top_margin,
                    boundary: None,
                });
                continue;
            };
            if !mentions_unbreakable(markup) {
                continue;
            }

            let isolation = &self.config.isolation;
            let measured =
                try_measure_isolated(&self.host, markup, element.bounds.width, isolation).await;
            self.ensure_current(started)?;

            match measured {
                Ok(boxes) => candidates.extend(boxes.into_iter().map(|b| Candidate {
                    path: b.path,
                    bounds: b.bounds.offset_y(element.bounds.top),
                    existing_top_margin: b.existing_top_margin,
                    boundary: Some(element.path.clone()),
                })),
                Err(e) => note(
                    notices,
                    Notice::Unmeasurable {
                        boundary: element.path.clone(),
                        reason: e.to_string(),
                    },
                ),
            }
        }
        Ok(candidates)
    }

    /// Sample the content height once per frame until it holds still.
    async fn stabilize(&self, tree: &ContentNode, width: f64, started: u64) -> Result<Settle> {
        let config = &self.config.stabilization;
        let mut stabilizer = Stabilizer::new(config.required_stable_frames, config.max_frames);
        loop {
            next_frame(config.frame_interval()).await;
            self.ensure_current(started)?;
            let height = self.surface.layout(tree, width).content_height();
            match stabilizer.observe(height) {
                Settle::Pending => continue,
                settled => {
                    log::trace!("stabilized after {} frame(s): {settled:?}", stabilizer.frames());
                    return Ok(settled);
                }
            }
        }
    }
}

/// Notices for planned adjustments that can no longer be applied.
fn unresolved(
    plan: &MarginPlan,
    candidates: &[Candidate],
    measurement: &Measurement,
    page_height: f64,
) -> Vec<Notice> {
    candidates
        .iter()
        .filter(|c| match &c.boundary {
            None => plan.margins.contains_key(&c.path),
            Some(boundary) => plan.isolated_margins.contains_key(boundary),
        })
        .filter_map(|c| {
            let span = span_of(&c.bounds, &measurement.container, page_height);
            span.spans_multiple_pages.then(|| Notice::UnresolvedSpan {
                path: c.boundary.clone().unwrap_or_else(|| c.path.clone()),
                start_page: span.start_page,
                end_page: span.end_page,
            })
        })
        .collect()
}
