//! Generalized pairwise Elo for N-way ranked matches
//!
//! Every unordered pair of participants is scored as a simulated two-player
//! Elo game. Each player's K-factor is split evenly across their `n - 1`
//! opponents, and the per-pair deltas are summed before any rating changes,
//! so the outcome does not depend on the order of the entries.

use crate::config::RatingConfig;
use crate::rating::engine::RatingEngine;
use crate::types::Player;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters of the Elo expectation curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    /// Scale `D` of the logistic curve
    pub scale: f64,
    /// Rating gaps are clamped to `[-max_rating_gap, max_rating_gap]`
    pub max_rating_gap: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            scale: 400.0,
            max_rating_gap: 400.0,
        }
    }
}

impl From<&RatingConfig> for EloConfig {
    fn from(config: &RatingConfig) -> Self {
        Self {
            scale: config.scale,
            max_rating_gap: config.max_rating_gap,
        }
    }
}

/// Multiplayer Elo rating engine
#[derive(Debug, Clone, Default)]
pub struct EloRatingEngine {
    config: EloConfig,
}

impl EloRatingEngine {
    /// Create an engine from the rating configuration
    pub fn new(config: &RatingConfig) -> crate::error::Result<Self> {
        config.validate()?;

        Ok(Self {
            config: EloConfig::from(config),
        })
    }

    pub fn config(&self) -> EloConfig {
        self.config
    }

    /// Actual score of a player in one pairing: win 1, loss 0, tie 0.5
    pub fn actual_score(score: f64, opponent_score: f64) -> f64 {
        if score > opponent_score {
            1.0
        } else if score < opponent_score {
            0.0
        } else {
            0.5
        }
    }

    /// Deltas of one simulated two-player game, scaled by `k_mult`
    fn pair_deltas(
        &self,
        (player1, score1): &(Player, f64),
        (player2, score2): &(Player, f64),
        k_mult: f64,
    ) -> (f64, f64) {
        let p1_expected = self.estimate_score_vs_one(player1.rating, player2.rating);
        let p1_actual = Self::actual_score(*score1, *score2);
        let p1_delta = player1.k_factor * k_mult * (p1_actual - p1_expected);

        let p2_expected = 1.0 - p1_expected;
        let p2_actual = 1.0 - p1_actual;
        let p2_delta = player2.k_factor * k_mult * (p2_actual - p2_expected);

        (p1_delta, p2_delta)
    }
}

impl RatingEngine for EloRatingEngine {
    fn calculate_deltas(&self, entries: &[(Player, f64)]) -> Vec<f64> {
        let num_players = entries.len();
        let mut deltas = vec![0.0; num_players];
        if num_players < 2 {
            return deltas;
        }

        let k_mult = 1.0 / (num_players - 1) as f64;

        for i in 0..num_players - 1 {
            for j in i + 1..num_players {
                let (delta_i, delta_j) = self.pair_deltas(&entries[i], &entries[j], k_mult);
                deltas[i] += delta_i;
                deltas[j] += delta_j;

                debug!(
                    "Pairing {} ({:+.2}) vs {} ({:+.2})",
                    entries[i].0.name, delta_i, entries[j].0.name, delta_j
                );
            }
        }

        deltas
    }

    fn estimate_score_vs_one(&self, rating: f64, opponent_rating: f64) -> f64 {
        let limit = self.config.max_rating_gap;
        let gap = (opponent_rating - rating).clamp(-limit, limit);
        1.0 / (1.0 + 10f64.powf(gap / self.config.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-9;

    fn entry(name: &str, rating: f64, score: f64) -> (Player, f64) {
        (Player::with_rating(name, rating, 32.0), score)
    }

    #[test]
    fn test_even_match_expectation() {
        let engine = EloRatingEngine::default();
        assert!((engine.estimate_score_vs_one(1500.0, 1500.0) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_rating_gap_is_clamped() {
        let engine = EloRatingEngine::default();
        let clamped = engine.estimate_score_vs_one(1000.0, 2000.0);
        let at_limit = engine.estimate_score_vs_one(1000.0, 1400.0);

        assert!((clamped - at_limit).abs() < EPSILON);
        assert!((at_limit - 1.0 / 11.0).abs() < EPSILON);
    }

    #[test]
    fn test_single_entry_returns_none() {
        let engine = EloRatingEngine::default();
        assert!(engine.report_game(vec![entry("Alice", 1200.0, 4.0)]).is_none());
        assert!(engine.report_game(Vec::new()).is_none());
    }

    #[test]
    fn test_two_player_exchange() {
        let engine = EloRatingEngine::default();
        let result = engine
            .report_game(vec![entry("Alice", 1000.0, 10.0), entry("Bob", 1000.0, 5.0)])
            .unwrap();

        let deltas: Vec<f64> = result.deltas().collect();
        assert!((deltas[0] - 16.0).abs() < EPSILON);
        assert!((deltas[1] + 16.0).abs() < EPSILON);
        assert!((result.entries[0].player.rating - 1016.0).abs() < EPSILON);
        assert_eq!(result.entries[0].player.games_played, 1);
    }

    #[test]
    fn test_tie_between_equals_changes_nothing() {
        let engine = EloRatingEngine::default();
        let deltas =
            engine.calculate_deltas(&[entry("Alice", 1300.0, 7.0), entry("Bob", 1300.0, 7.0)]);
        assert!(deltas.iter().all(|d| d.abs() < EPSILON));
    }

    #[test]
    fn test_three_player_scenario() {
        let engine = EloRatingEngine::default();
        let result = engine
            .report_game(vec![
                entry("Alice", 1200.0, 4.0),
                entry("Bob", 1400.0, 3.0),
                entry("Charlie", 1600.0, 1.0),
            ])
            .unwrap();

        let alice = result.delta_for("Alice").unwrap();
        let bob = result.delta_for("Bob").unwrap();
        let charlie = result.delta_for("Charlie").unwrap();

        assert!(alice > 0.0);
        assert!(alice > bob && bob > charlie);
        assert!(charlie < 0.0);
        assert!(bob.abs() < EPSILON);
        assert!((alice + bob + charlie).abs() < EPSILON);

        // Original order is preserved
        let names: Vec<&str> = result.players().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
    }

    #[test]
    fn test_deltas_do_not_depend_on_iteration_order() {
        let engine = EloRatingEngine::default();
        let forward = vec![
            entry("A", 1100.0, 3.0),
            entry("B", 1500.0, 9.0),
            entry("C", 900.0, 1.0),
            entry("D", 1250.0, 5.0),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let forward_deltas = engine.calculate_deltas(&forward);
        let mut reversed_deltas = engine.calculate_deltas(&reversed);
        reversed_deltas.reverse();

        for (a, b) in forward_deltas.iter().zip(&reversed_deltas) {
            assert!((a - b).abs() < EPSILON);
        }
    }

    #[test]
    fn test_per_player_k_factor() {
        let engine = EloRatingEngine::default();
        let newcomer = (Player::with_rating("New", 1000.0, 64.0), 2.0);
        let veteran = (Player::with_rating("Vet", 1000.0, 16.0), 1.0);

        let deltas = engine.calculate_deltas(&[newcomer, veteran]);
        assert!((deltas[0] - 32.0).abs() < EPSILON);
        assert!((deltas[1] + 8.0).abs() < EPSILON);
    }

    proptest! {
        #[test]
        fn prop_expectations_are_complementary(r1 in 0.0f64..4000.0, r2 in 0.0f64..4000.0) {
            let engine = EloRatingEngine::default();
            let sum = engine.estimate_score_vs_one(r1, r2) + engine.estimate_score_vs_one(r2, r1);
            prop_assert!((sum - 1.0).abs() < EPSILON);
        }

        #[test]
        fn prop_two_player_winner_gains_loser_loses(
            r1 in 0.0f64..3000.0,
            r2 in 0.0f64..3000.0,
            loser_score in 0.0f64..100.0,
            margin in 0.001f64..100.0,
        ) {
            let engine = EloRatingEngine::default();
            let deltas = engine.calculate_deltas(&[
                entry("winner", r1, loser_score + margin),
                entry("loser", r2, loser_score),
            ]);

            prop_assert!(deltas[0] >= 0.0);
            prop_assert!(deltas[1] <= 0.0);
            prop_assert!((deltas[0] + deltas[1]).abs() < EPSILON);
        }

        #[test]
        fn prop_field_is_zero_sum(
            field in prop::collection::vec((0.0f64..3000.0, 0.0f64..500.0), 2..12)
        ) {
            let engine = EloRatingEngine::default();
            let entries: Vec<(Player, f64)> = field
                .iter()
                .enumerate()
                .map(|(i, (rating, score))| entry(&format!("p{}", i), *rating, *score))
                .collect();

            let total: f64 = engine.calculate_deltas(&entries).iter().sum();
            prop_assert!(total.abs() < 1e-6);
        }

        #[test]
        fn prop_reporting_is_repeatable(
            field in prop::collection::vec((0.0f64..3000.0, 0.0f64..500.0), 2..8)
        ) {
            let engine = EloRatingEngine::default();
            let entries: Vec<(Player, f64)> = field
                .iter()
                .enumerate()
                .map(|(i, (rating, score))| entry(&format!("p{}", i), *rating, *score))
                .collect();

            let first: Vec<f64> = engine.report_game(entries.clone()).unwrap().deltas().collect();
            let second: Vec<f64> = engine.report_game(entries).unwrap().deltas().collect();
            prop_assert_eq!(first, second);
        }
    }
}
