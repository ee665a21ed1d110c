//! Rating engine trait
//!
//! This module defines the interface for turning one ranked match result into
//! rating deltas for every participant.

use crate::types::{Player, RatedEntry, RatedResult};

/// Trait for calculating rating changes after a match
pub trait RatingEngine: Send + Sync {
    /// Compute the summed delta of every entry without touching any rating
    ///
    /// # Arguments
    /// * `entries` - Players with their match scores, higher score is better
    ///
    /// # Returns
    /// One delta per entry, in entry order
    fn calculate_deltas(&self, entries: &[(Player, f64)]) -> Vec<f64>;

    /// Expected score (win probability) of `rating` against `opponent_rating`
    fn estimate_score_vs_one(&self, rating: f64, opponent_rating: f64) -> f64;

    /// Rate one completed match
    ///
    /// Returns `None` when fewer than two players took part; nothing is
    /// modified in that case. Otherwise every player comes back with their
    /// delta applied, in the original entry order.
    fn report_game(&self, entries: Vec<(Player, f64)>) -> Option<RatedResult> {
        if entries.len() < 2 {
            return None;
        }

        let deltas = self.calculate_deltas(&entries);
        let entries = entries
            .into_iter()
            .zip(deltas)
            .map(|((mut player, score), delta)| {
                player.apply_match_delta(delta);
                RatedEntry {
                    player,
                    score,
                    delta,
                }
            })
            .collect();

        Some(RatedResult { entries })
    }
}
