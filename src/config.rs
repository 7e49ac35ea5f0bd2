//! Pagination configuration.
//!
//! Every field has a default, so `{}` is a valid configuration and callers
//! only spell out what they change:
//!
//! ```json
//! { "pageSize": "Letter", "stabilization": { "frameIntervalMs": 0 } }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};
use crate::model::PageSize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationConfig {
    pub page_size: PageSize,
    /// Upper bound on Measuring → Stabilizing iterations in one pass.
    pub max_passes: u32,
    pub stabilization: StabilizationConfig,
    pub isolation: IsolationConfig,
    pub estimate: EstimateConfig,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            max_passes: 4,
            stabilization: StabilizationConfig::default(),
            isolation: IsolationConfig::default(),
            estimate: EstimateConfig::default(),
        }
    }
}

impl PaginationConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PaginationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reject configurations that cannot produce pages.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.page_size.dimensions();
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(FolioError::InvalidPage(format!(
                "{} page must have positive dimensions, got {width}x{height}",
                self.page_size.name()
            )));
        }
        if self.max_passes == 0 {
            return Err(FolioError::InvalidPage(
                "maxPasses must allow at least one pass".to_string(),
            ));
        }
        Ok(())
    }
}

/// The height-polling convergence detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilizationConfig {
    /// Consecutive unchanged samples needed to call the layout settled.
    pub required_stable_frames: u32,
    /// Samples taken before giving up.
    pub max_frames: u32,
    /// Delay between samples. Zero yields to the scheduler instead.
    pub frame_interval_ms: u64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            required_stable_frames: 10,
            max_frames: 600,
            frame_interval_ms: 16,
        }
    }
}

impl StabilizationConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Isolated-surface measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IsolationConfig {
    pub load_timeout_ms: u64,
    /// Extra wait after the surface reports ready, for sub-layout engines
    /// that finish after load.
    pub settle_delay_ms: u64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 5000,
            settle_delay_ms: 100,
        }
    }
}

impl IsolationConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Per-tag height heuristics for the table span estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimateConfig {
    pub average_row_height: f64,
    /// `h1` through `h6`.
    pub heading_heights: [f64; 6],
    /// `p`, `li` and `blockquote`.
    pub paragraph_height: f64,
    /// `hr`, `img` and `pre`.
    pub default_block_height: f64,
    /// Frames without an explicit height.
    pub frame_height: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            average_row_height: 40.0,
            heading_heights: [48.0, 40.0, 32.0, 28.0, 24.0, 20.0],
            paragraph_height: 24.0,
            default_block_height: 20.0,
            frame_height: 200.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default() {
        let config = PaginationConfig::from_json("{}").unwrap();
        assert_eq!(config, PaginationConfig::default());
        assert_eq!(config.page_size, PageSize::A4);
        assert_eq!(config.stabilization.required_stable_frames, 10);
    }

    #[test]
    fn partial_overrides() {
        let config = PaginationConfig::from_json(
            r#"{"pageSize": "Letter", "maxPasses": 2, "stabilization": {"frameIntervalMs": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.page_size, PageSize::Letter);
        assert_eq!(config.max_passes, 2);
        assert_eq!(config.stabilization.frame_interval(), Duration::ZERO);
        assert_eq!(config.stabilization.max_frames, 600);
        assert_eq!(config.isolation.load_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn custom_page_sizes() {
        let config = PaginationConfig::from_json(
            r#"{"pageSize": {"Custom": {"width": 400, "height": 300}}}"#,
        )
        .unwrap();
        assert_eq!(config.page_size.dimensions(), (400.0, 300.0));
    }

    #[test]
    fn rejects_degenerate_pages() {
        let err = PaginationConfig::from_json(
            r#"{"pageSize": {"Custom": {"width": 400, "height": 0}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FolioError::InvalidPage(_)));
        assert!(err.to_string().contains("Custom page"));
    }

    #[test]
    fn unknown_page_names_are_schema_errors() {
        let err = PaginationConfig::from_json(r#"{"pageSize": "B5"}"#).unwrap_err();
        assert!(matches!(err, FolioError::Json { .. }));
    }
}
