//! Rating system: multiplayer Elo, player persistence and result processing
//!
//! This module provides the rating engine, the player store interface with
//! its in-memory implementation, and the processor that ties them together.

pub mod elo;
pub mod engine;
pub mod processor;
pub mod storage;

// Re-export commonly used types
pub use elo::EloRatingEngine;
pub use engine::RatingEngine;
pub use processor::ResultProcessor;
pub use storage::{InMemoryPlayerStore, MockPlayerStore, PlayerStore, WriteLock};
