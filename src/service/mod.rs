//! Service layer
//!
//! This module wires the session driver to the rating system and exposes the
//! administrative rating operations.

pub mod ratings;
pub mod watcher;

pub use ratings::{RankedPlayer, RatingService};
pub use watcher::{MatchOutcome, MatchWatcher, OutcomeStream};
