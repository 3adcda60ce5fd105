//! Error handling logic

use thiserror::Error;

/// Error types raised while building or evaluating a walk.
///
/// None of these are retried: every failure is deterministic, so running the
/// same request again cannot change the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    /// Invalid walk configuration or mode bookkeeping.
    /// Raised before any backend call is made.
    #[error("Configuration Error: {message}")]
    Config {
        /// Configuration failure message
        message: String,
    },

    /// A detection request could not be evaluated against the built circuit.
    #[error("Evaluation Error ({pattern}): {message}")]
    Evaluation {
        /// The offending outcome pattern, rendered for display
        pattern: String,
        /// Evaluation failure message
        message: String,
    },

    /// Failure inside the photonic backend (singular covariance, non-finite
    /// probabilities, resource limits).
    #[error("Backend Error: {message}")]
    Backend {
        /// Backend failure message
        message: String,
    },
}

impl WalkError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        WalkError::Config { message: message.into() }
    }

    pub(crate) fn evaluation(pattern: impl ToString, message: impl Into<String>) -> Self {
        WalkError::Evaluation { pattern: pattern.to_string(), message: message.into() }
    }

    pub(crate) fn backend(message: impl Into<String>) -> Self {
        WalkError::Backend { message: message.into() }
    }
}

/// Result alias used throughout the crate.
pub type WalkResult<T> = Result<T, WalkError>;
