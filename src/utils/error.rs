//! Error types for HeroReel
//!
//! This module defines custom error types used throughout the crate.
//! We use thiserror for convenient error type definitions and anyhow for
//! application-level error handling.
//!
//! Scheduling faults (empty clip sets, unplayable media, guarded advances)
//! are not errors and never show up here; only configuration and registry
//! ingest can fail.

use thiserror::Error;

/// Main error type for HeroReel
#[derive(Error, Debug)]
pub enum HeroReelError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A clip record that cannot be scheduled
    #[error("Invalid clip '{id}': {reason}")]
    InvalidClip {
        id: String,
        reason: String,
    },

    /// Clip registry snapshot could not be read or parsed
    #[error("Registry error: {0}")]
    Registry(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for HeroReelError {
    fn from(err: serde_json::Error) -> Self {
        HeroReelError::Registry(format!("Malformed clip set: {}", err))
    }
}

impl HeroReelError {
    /// Create an invalid clip error
    pub fn invalid_clip<I: Into<String>, R: Into<String>>(id: I, reason: R) -> Self {
        HeroReelError::InvalidClip {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results in HeroReel
pub type Result<T> = std::result::Result<T, HeroReelError>;

/// Extension trait for converting other errors to HeroReelError
pub trait IntoReelError<T> {
    /// Convert this error into a HeroReelError with the given context
    fn config_err(self, context: &str) -> Result<T>;
    fn registry_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoReelError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| HeroReelError::Config(format!("{}: {}", context, e)))
    }

    fn registry_err(self, context: &str) -> Result<T> {
        self.map_err(|e| HeroReelError::Registry(format!("{}: {}", context, e)))
    }
}

/// Helper macro for creating internal errors with file and line information
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::utils::error::HeroReelError::Internal(
            format!("{} at {}:{}", $msg, file!(), line!())
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::HeroReelError::Internal(
            format!("{} at {}:{}", format!($fmt, $($arg)*), file!(), line!())
        )
    };
}
