//! # Render Cache
//!
//! Rendering a template is the expensive step before pagination, and the
//! same document is usually paginated many times while it is previewed.
//! [`RenderCache`] keeps the last good rendering per document and page size.
//! It is an owned value: whoever owns it decides its lifetime, and
//! invalidation is explicit.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Output of the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub markup: String,
    pub plain_text: String,
}

/// The external templating engine: template plus props in, markup out.
pub trait RenderingEngine {
    fn render(&self, template: &str, props: &serde_json::Value) -> Result<RenderedDocument>;
}

/// What a rendering is cached under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Document identity, usually its path.
    pub document: String,
    /// Page size name, for documents rendered per size.
    pub page_size: Option<String>,
}

impl CacheKey {
    pub fn new(document: &str) -> Self {
        Self {
            document: document.to_string(),
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: &str) -> Self {
        self.page_size = Some(page_size.to_string());
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.page_size {
            Some(size) => write!(f, "{}__{size}", self.document),
            None => f.write_str(&self.document),
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<CacheKey, RenderedDocument>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the cached rendering for `key`, rendering it on a miss.
    ///
    /// With `invalidate` set, the cached entry is dropped first. Failed
    /// renders are returned as errors and never cached.
    pub fn get_or_render(
        &mut self,
        key: CacheKey,
        invalidate: bool,
        engine: &impl RenderingEngine,
        template: &str,
        props: &serde_json::Value,
    ) -> Result<&RenderedDocument> {
        if invalidate {
            self.invalidate(&key);
        }
        if !self.entries.contains_key(&key) {
            log::debug!("rendering {key}");
            let mut rendered = engine.render(template, props)?;
            rendered.markup.retain(|c| c != '\0');
            self.entries.insert(key.clone(), rendered);
        } else {
            log::trace!("render cache hit for {key}");
        }
        Ok(&self.entries[&key])
    }

    pub fn get(&self, key: &CacheKey) -> Option<&RenderedDocument> {
        self.entries.get(key)
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every page size of `document`.
    pub fn invalidate_document(&mut self, document: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.document != document);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FolioError;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counting {
        calls: Cell<u32>,
        fail: Cell<bool>,
    }

    impl RenderingEngine for Counting {
        fn render(&self, template: &str, props: &serde_json::Value) -> Result<RenderedDocument> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(FolioError::Render("template threw".to_string()));
            }
            Ok(RenderedDocument {
                markup: format!("<p>{template}\0{}</p>", props["name"].as_str().unwrap_or("")),
                plain_text: template.to_string(),
            })
        }
    }

    fn props() -> serde_json::Value {
        serde_json::json!({ "name": "Ada" })
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let engine = Counting::default();
        let mut cache = RenderCache::new();
        let key = CacheKey::new("invoice.tsx");
        cache.get_or_render(key.clone(), false, &engine, "hi", &props()).unwrap();
        let doc = cache.get_or_render(key, false, &engine, "hi", &props()).unwrap();
        assert_eq!(doc.markup, "<p>hiAda</p>");
        assert_eq!(engine.calls.get(), 1);
    }

    #[test]
    fn invalidation_forces_a_render() {
        let engine = Counting::default();
        let mut cache = RenderCache::new();
        let key = CacheKey::new("invoice.tsx");
        cache.get_or_render(key.clone(), false, &engine, "hi", &props()).unwrap();
        cache.get_or_render(key, true, &engine, "hi", &props()).unwrap();
        assert_eq!(engine.calls.get(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let engine = Counting::default();
        engine.fail.set(true);
        let mut cache = RenderCache::new();
        let key = CacheKey::new("broken.tsx");
        assert!(cache.get_or_render(key.clone(), false, &engine, "x", &props()).is_err());
        assert!(cache.is_empty());
        engine.fail.set(false);
        assert!(cache.get_or_render(key, false, &engine, "x", &props()).is_ok());
        assert_eq!(engine.calls.get(), 2);
    }

    #[test]
    fn page_sizes_are_separate_entries() {
        let engine = Counting::default();
        let mut cache = RenderCache::new();
        let a4 = CacheKey::new("doc.tsx").with_page_size("A4");
        let letter = CacheKey::new("doc.tsx").with_page_size("Letter");
        assert_eq!(a4.to_string(), "doc.tsx__A4");
        cache.get_or_render(a4, false, &engine, "x", &props()).unwrap();
        cache.get_or_render(letter, false, &engine, "x", &props()).unwrap();
        cache
            .get_or_render(CacheKey::new("other.tsx"), false, &engine, "x", &props())
            .unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.invalidate_document("doc.tsx"), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
