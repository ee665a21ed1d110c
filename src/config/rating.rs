//! Rating system configuration

use crate::error::{RankingError, Result};
use crate::types::{DEFAULT_K_FACTOR, DEFAULT_RATING};
use serde::{Deserialize, Serialize};

/// Parameters of the multiplayer Elo engine and the player store defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating of a player seen for the first time
    pub initial_rating: f64,
    /// K-factor of a player seen for the first time
    pub default_k_factor: f64,
    /// Elo scale `D`: a gap of `D` points means 10:1 expected odds
    pub scale: f64,
    /// Rating gaps beyond this are clamped before computing expectations
    pub max_rating_gap: f64,
    /// Entries per leaderboard page
    pub leaderboard_page_size: usize,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: DEFAULT_RATING,
            default_k_factor: DEFAULT_K_FACTOR,
            scale: 400.0,
            max_rating_gap: 400.0,
            leaderboard_page_size: 20,
        }
    }
}

impl RatingConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.initial_rating.is_finite() {
            return Err(RankingError::ConfigurationError {
                message: "Initial rating must be finite".to_string(),
            }
            .into());
        }

        if self.default_k_factor <= 0.0 {
            return Err(RankingError::ConfigurationError {
                message: "Default K-factor must be positive".to_string(),
            }
            .into());
        }

        if self.scale <= 0.0 {
            return Err(RankingError::ConfigurationError {
                message: "Elo scale must be positive".to_string(),
            }
            .into());
        }

        if !(self.max_rating_gap.is_finite() && self.max_rating_gap > 0.0) {
            return Err(RankingError::ConfigurationError {
                message: "Maximum rating gap must be a positive number".to_string(),
            }
            .into());
        }

        if self.leaderboard_page_size == 0 {
            return Err(RankingError::ConfigurationError {
                message: "Leaderboard page size must be at least 1".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
