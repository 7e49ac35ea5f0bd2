//! # Folio
//!
//! A pagination engine for document previews.
//!
//! Rendered templates are one long flow of content. Folio turns that flow
//! into fixed-size pages (A4, Letter, ...) without letting a page boundary
//! cut through anything marked unbreakable. It does not partition the
//! content: every page is a viewport onto the same tree, offset by one page
//! height and clipped. What Folio changes is *spacing*. Elements that would
//! straddle a boundary receive exactly enough top margin to start on the
//! next page.
//!
//! Getting that spacing right is a measurement problem. Margins collapse,
//! embedded documents (iframes) lay out independently and may refuse
//! inspection, and geometry keeps moving while fonts and sub-documents
//! load. So the driver iterates: measure, analyze, mutate, and measure again
//! until the content height holds still.
//!
//! ## Architecture
//!
//! ```text
//! Input (markup / JSON tree)
//!       ↓
//!   [markup]    Markup ⇄ content tree, in-place markup patching
//!       ↓
//!   [registry]  Which nodes must not be split
//!       ↓
//!   [measure]   Geometry via a LayoutSurface; embedded documents
//!       ↓       via an IsolationHost
//!   [span]      Who straddles a page boundary, and by how much
//!   [table]     Which tables span pages, where headers repeat
//!       ↓
//!   [mutate]    New tree with replaced top margins
//!       ↓
//!   [paginate]  The stabilizing loop, then page viewports
//! ```
//!
//! [`layout::BlockLayout`] is a headless block-flow surface, so everything
//! above runs without a browser. [`distribute`] offers the other strategy:
//! handing blocks out to pages instead of sliding a viewport.

pub mod cache;
pub mod config;
pub mod distribute;
pub mod error;
pub mod layout;
pub mod markup;
pub mod measure;
pub mod model;
pub mod mutate;
pub mod paginate;
pub mod registry;
pub mod span;
pub mod style;
pub mod table;

pub use config::PaginationConfig;
pub use error::{FolioError, HostError, Result};
pub use model::{ContentNode, NodePath, PageSize};
pub use paginate::{Notice, Page, Pagination, Paginator};

/// Paginate rendered markup with the headless engine.
///
/// This is the primary entry point. Takes the rendering engine's markup and
/// returns the stabilized pages.
pub async fn paginate_markup(markup: &str, config: PaginationConfig) -> Result<Pagination> {
    let tree = markup::parse_markup(markup)?;
    Paginator::headless(config).paginate(&tree).await
}

/// Paginate a content tree described as JSON with the headless engine.
pub async fn paginate_json(json: &str, config: PaginationConfig) -> Result<Pagination> {
    let tree: ContentNode = serde_json::from_str(json)?;
    Paginator::headless(config).paginate(&tree).await
}
