//! Isolation hosts: detached surfaces that render embedded documents.

use std::future::Future;

use crate::error::HostError;
use crate::layout::{LayoutResult, LayoutSurface};
use crate::markup::parse_markup;

/// A loaded, invisible rendering surface holding one embedded document.
///
/// Dropping the surface tears it down.
pub trait IsolatedSurface {
    /// The laid-out document, or an error when its interior cannot be
    /// inspected.
    fn document(&self) -> Result<LayoutResult, HostError>;
}

/// Something that can render raw markup off-screen.
pub trait IsolationHost {
    type Surface: IsolatedSurface;

    /// Inject `markup` into a fresh surface `width` pixels wide and resolve
    /// once it signals ready.
    fn load(
        &self,
        markup: &str,
        width: f64,
    ) -> impl Future<Output = Result<Self::Surface, HostError>>;
}

/// Host that lays embedded markup out with a [`LayoutSurface`].
#[derive(Debug, Clone, Default)]
pub struct MarkupHost<S> {
    surface: S,
}

impl<S: LayoutSurface> MarkupHost<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }
}

impl<S: LayoutSurface> IsolationHost for MarkupHost<S> {
    type Surface = MarkupSurface;

    async fn load(&self, markup: &str, width: f64) -> Result<MarkupSurface, HostError> {
        let tree = parse_markup(markup).map_err(|e| HostError::Load(e.to_string()))?;
        log::trace!("isolated surface loaded ({} bytes, {width}px wide)", markup.len());
        Ok(MarkupSurface {
            result: self.surface.layout(&tree, width),
        })
    }
}

#[derive(Debug)]
pub struct MarkupSurface {
    result: LayoutResult,
}

impl IsolatedSurface for MarkupSurface {
    fn document(&self) -> Result<LayoutResult, HostError> {
        Ok(self.result.clone())
    }
}

impl Drop for MarkupSurface {
    fn drop(&mut self) {
        log::trace!("isolated surface torn down");
    }
}
