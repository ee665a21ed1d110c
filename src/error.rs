//! Error types for the rating service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

use crate::types::SessionState;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific session and rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("Session disconnected: {message}")]
    Disconnected { message: String },

    #[error("Invalid session state for {operation}: {state}")]
    InvalidState {
        operation: String,
        state: SessionState,
    },

    #[error("A watch loop is already active for this session")]
    AlreadyWatching,

    #[error("Persistence failed: {message}")]
    PersistenceFailed { message: String },

    #[error("Player not found: {name}")]
    PlayerNotFound { name: String },

    #[error("Rating calculation failed: {reason}")]
    RatingCalculationFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Session platform fault: {message}")]
    DriverFault { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

/// Whether an error chain carries a lost connection to the session platform
pub fn is_disconnection(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| {
            matches!(
                cause.downcast_ref::<RankingError>(),
                Some(RankingError::Disconnected { .. })
            )
        })
}

/// Whether an error chain carries a failed store write or commit
pub fn is_persistence_failure(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<RankingError>(),
            Some(RankingError::PersistenceFailed { .. })
        )
    })
}
