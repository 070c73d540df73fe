//! Error taxonomy for the wizard session.
//!
//! Every failure a session can observe maps onto one of these kinds. All of
//! them are caught at the component that produced them and surfaced as a
//! dismissible notification; none abort the session.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A readiness precondition was not met. Normally unreachable from the
    /// UI because the triggering control is disabled while checks fail.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The computation or document boundary was unreachable or returned a
    /// transport-level failure. Retryable.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The boundary answered, but the payload did not match the expected
    /// shape. Hard failure for that request.
    #[error("Unexpected response shape: {message}")]
    Schema { message: String },

    /// Image rasterization failed. Scoped to the image export path.
    #[error("Render failed: {message}")]
    Render { message: String },

    /// A second submit was attempted while a request was already in flight.
    #[error("An analysis request is already pending")]
    Busy,

    /// An export was requested with no current (non-stale) result to draw from.
    #[error("No analysis result available")]
    NoResult,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    pub fn network(message: impl Into<String>) -> Self {
        AnalysisError::Network {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        AnalysisError::Schema {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        AnalysisError::Render {
            message: message.into(),
        }
    }

    /// Transient errors leave a previously cached result untouched and the
    /// run control re-enabled for retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Network { .. })
    }

    /// Short title for the notification line.
    pub fn title(&self) -> &'static str {
        match self {
            AnalysisError::Validation { .. } => "Validation failed",
            AnalysisError::Network { .. } => "Network error",
            AnalysisError::Schema { .. } => "Malformed response",
            AnalysisError::Render { .. } => "Image render failed",
            AnalysisError::Busy => "Analysis already running",
            AnalysisError::NoResult => "No result to export",
            AnalysisError::Io(_) => "File error",
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Network {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Schema {
            message: err.to_string(),
        }
    }
}
