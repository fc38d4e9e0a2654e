//! Common error types used throughout transcoder.
//!
//! Synchronous failures (`AlreadyRunning`, `InvalidParameter`,
//! `ResourceUnavailable`) are returned directly from submission. Failures that
//! happen after a job has been accepted are never returned; they reach the
//! observer as a terminal outcome instead.

use std::path::PathBuf;

/// Common error type for transcoder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A job is already running on this controller.
    #[error("A transcode job is already running")]
    AlreadyRunning,

    /// User-supplied configuration input was malformed.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The input resource could not be opened.
    #[error("Resource unavailable: {}: {message}", path.display())]
    ResourceUnavailable { path: PathBuf, message: String },

    /// The input cannot be transcoded with the requested configuration.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// The engine reported a terminal failure.
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// Releasing the input handle failed after a terminal event.
    #[error("Cleanup failure: {0}")]
    CleanupFailure(#[source] std::io::Error),

    /// An external tool was missing or failed.
    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new InvalidParameter error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new ResourceUnavailable error.
    pub fn resource_unavailable<P: Into<PathBuf>, S: Into<String>>(path: P, msg: S) -> Self {
        Self::ResourceUnavailable {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a new UnsupportedInput error.
    pub fn unsupported_input<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedInput(msg.into())
    }

    /// Create a new EngineFailure error.
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        Self::EngineFailure(msg.into())
    }

    /// Create a new Tool error.
    pub fn tool<T: Into<String>, S: Into<String>>(tool: T, msg: S) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Whether the error was raised synchronously by submission validation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning
                | Self::InvalidParameter(_)
                | Self::ResourceUnavailable { .. }
                | Self::UnsupportedInput(_)
        )
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
