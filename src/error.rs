//! Error types for the batch client.

use thiserror::Error;

/// Result type alias using the volley error type.
pub type Result<T> = std::result::Result<T, VolleyError>;

/// Main error type for the batch client.
///
/// Per-item failures (a corrupt output line, a non-200 per-request response)
/// never surface here. They degrade to failure records or `None` turns so a
/// single bad item cannot abort a whole batch. Only batch-level failures
/// propagate as errors.
#[derive(Error, Debug)]
pub enum VolleyError {
    /// Caller requested a schema feature the vendor API does not support
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The vendor API returned a non-2xx response
    #[error("HTTP {status} from {path}: {body}")]
    Transport {
        path: String,
        status: u16,
        body: String,
    },

    /// Network-level failure from the HTTP client
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Output and error files together contained no records at all
    #[error("batch produced no parseable output records")]
    EmptyBatchOutput,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file I/O error (staging uploads and downloads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
