//! Structured error types for the Folio pagination engine.
//!
//! Hard failures are rare by construction: the engine prefers degraded output
//! over no output, so most trouble surfaces as a [`Notice`](crate::paginate::Notice)
//! on the pagination result instead. What remains here are input errors
//! (bad JSON, unparseable markup, an impossible page size) and the
//! "superseded" signal for passes invalidated mid-flight.

use std::time::Duration;

use thiserror::Error;

/// The unified error type returned by public Folio API functions.
#[derive(Debug, Error)]
pub enum FolioError {
    /// JSON input (a content tree or a configuration) failed to parse.
    #[error("failed to parse JSON input: {source}{}", hint_suffix(.hint))]
    Json {
        source: serde_json::Error,
        hint: String,
    },

    /// Markup could not be read or rewritten.
    #[error("malformed markup at byte {position}: {message}")]
    Markup { position: u64, message: String },

    /// The page configuration cannot produce pages.
    #[error("invalid page size: {0}")]
    InvalidPage(String),

    /// A newer content version or a resize invalidated this pass.
    #[error("pagination pass superseded (started at version {started}, now at {current})")]
    Superseded { started: u64, current: u64 },

    /// The external rendering engine failed to produce markup.
    #[error("rendering failed: {0}")]
    Render(String),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the expected schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FolioError::Json { source: e, hint }
    }
}

/// Failures of an isolation host (the detached surface that renders an
/// embedded sub-document). These never escape the measurement service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The surface failed to load the markup.
    #[error("isolated surface failed to load: {0}")]
    Load(String),

    /// The surface loaded but its document cannot be inspected.
    #[error("isolated surface cannot be introspected: {0}")]
    Unintrospectable(String),

    /// The surface never signalled readiness.
    #[error("isolated surface not ready after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, FolioError>;
