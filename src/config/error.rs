//! Error types and result aliases.
//!
//! Defines the core `TrackingError` enumeration and common `Result` type.

use thiserror::Error;

/// Tracking cookie errors.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The random byte source failed or was asked for an impossible token.
    #[error("token generation failed: {0}")]
    Random(String),

    /// A cookie could not be rendered as an HTTP header value.
    #[error("invalid header value: {0}")]
    Header(String),
}

/// Result type alias for `TrackingError`.
pub type Result<T> = std::result::Result<T, TrackingError>;
