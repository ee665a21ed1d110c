//! Session Elo - skill ratings for repeating multiplayer sessions
//!
//! This crate watches competitive sessions through a pluggable platform
//! driver, rates every finished match with a generalized multiplayer Elo,
//! and persists the results in a player store.

pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RankingError, Result};
pub use types::*;

// Re-export key components
pub use rating::{EloRatingEngine, PlayerStore, RatingEngine, ResultProcessor};
pub use service::{MatchOutcome, MatchWatcher, RatingService};
pub use session::{SessionDriver, SessionPlatform, SessionStateMachine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
