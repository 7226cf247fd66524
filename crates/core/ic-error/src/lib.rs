//! Error types and classification for infra-catalog.
//!
//! This crate provides:
//! - [`IcError`] - Top-level error enum shared by every discovery component
//! - [`ErrorCategory`] for retry decision making
//! - Classification logic based on error variant and, for opaque SDK
//!   failures, on the error message

use thiserror::Error;

/// Top-level error type for infra-catalog.
#[derive(Error, Debug)]
pub enum IcError {
    /// The requested parameter path does not exist remotely
    #[error("Parameter not found: {0}")]
    NotFound(String),

    /// The remote rejected the call because a rate limit was exceeded
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Connectivity failure (timeout, connection reset, DNS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A retryable failure persisted past the backoff budget
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<IcError>,
    },

    /// Cache read/write failure; callers treat it as a cache miss
    #[error("Cache error: {0}")]
    Cache(String),

    /// Remote data failed a structural check
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation observed the cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IcError {
    /// Returns the innermost error, unwrapping any `RetryExhausted` layers.
    pub fn root_cause(&self) -> &IcError {
        match self {
            IcError::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error (or the error it wraps) is a missing parameter.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), IcError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IcError::Cancelled)
    }
}

/// Error classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry with exponential backoff
    ///
    /// Examples: throttling, connection reset, timeout, DNS failure
    Retryable,

    /// Permanent error - propagate immediately
    ///
    /// Examples: parameter not found, validation, access denied
    Fatal,
}

/// Classifies an error to determine retry behavior.
pub fn classify_error(error: &IcError) -> ErrorCategory {
    match error {
        IcError::Throttled(_) | IcError::Transport(_) => ErrorCategory::Retryable,
        IcError::NotFound(_)
        | IcError::RetryExhausted { .. }
        | IcError::Cache(_)
        | IcError::Validation(_)
        | IcError::Cancelled
        | IcError::Config(_) => ErrorCategory::Fatal,
        IcError::Other(e) => classify_message(&e.to_string()),
    }
}

/// Classify a free-form error message.
///
/// Used for SDK failures that do not map onto a modeled error variant.
/// Unknown messages are fatal: only signals that are known to clear up on
/// their own are retried.
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();

    if lower.contains("throttl")
        || lower.contains("rate exceeded")
        || lower.contains("toomanyrequests")
        || lower.contains("too many requests")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("failed to lookup address")
        || lower.contains("service unavailable")
        || lower.contains("internal server error")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
    {
        return ErrorCategory::Retryable;
    }

    ErrorCategory::Fatal
}

/// Result type alias using IcError.
pub type Result<T> = std::result::Result<T, IcError>;
