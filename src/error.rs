//! Error types for the Turnstile library.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// Note that a rejected request is not an error: [`admit`] reports it as a
/// normal [`Decision::Reject`] outcome.
///
/// [`admit`]: crate::ratelimit::RateLimiter::admit
/// [`Decision::Reject`]: crate::ratelimit::Decision::Reject
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
