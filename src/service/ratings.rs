//! Rating service
//!
//! Read-side queries (leaderboard pages, ranks, what-if simulation) and the
//! administrative writes that run alongside the watch loop. Writes hold the
//! store's write lock, like the result processor does.

use crate::config::RatingConfig;
use crate::error::{RankingError, Result};
use crate::rating::{PlayerStore, RatingEngine, ResultProcessor};
use crate::types::Player;
use crate::utils::page_offset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// A leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPlayer {
    /// 1-based position on the leaderboard
    pub rank: usize,
    pub player: Player,
}

/// Queries and administrative operations on player ratings
#[derive(Clone)]
pub struct RatingService {
    store: Arc<dyn PlayerStore>,
    engine: Arc<dyn RatingEngine>,
    config: RatingConfig,
}

impl RatingService {
    /// Share the processor's store and engine
    pub fn new(processor: &ResultProcessor, config: RatingConfig) -> Self {
        Self {
            store: processor.store(),
            engine: processor.engine(),
            config,
        }
    }

    /// One 1-based page of the leaderboard
    pub fn leaderboard(&self, page: usize, page_size: Option<usize>) -> Result<Vec<RankedPlayer>> {
        let page_size = page_size.unwrap_or(self.config.leaderboard_page_size);
        let offset = page_offset(page, page_size);

        let players = self.store.get_leaderboard(page_size, offset)?;
        Ok(players
            .into_iter()
            .enumerate()
            .map(|(i, player)| RankedPlayer {
                rank: offset + i + 1,
                player,
            })
            .collect())
    }

    /// Leaderboard position of a stored player
    pub fn rank(&self, name: &str) -> Result<RankedPlayer> {
        let player = self.require_player(name)?;
        let rank = self.store.get_ranking(&player)?;
        Ok(RankedPlayer { rank, player })
    }

    /// Read a player without creating one
    pub fn get_player(&self, name: &str) -> Result<Option<Player>> {
        self.store.read_player(name, false)
    }

    /// Probability that `name` beats `opponent` head to head
    ///
    /// Unknown players are assumed to be fresh players; nothing is stored.
    pub fn simulate_1v1(&self, name: &str, opponent: &str) -> Result<f64> {
        let player = self.read_or_default(name)?;
        let other = self.read_or_default(opponent)?;
        Ok(self
            .engine
            .estimate_score_vs_one(player.rating, other.rating))
    }

    /// Overwrite a player's rating, creating the player if needed
    pub async fn set_rating(&self, name: &str, rating: f64) -> Result<Player> {
        if !rating.is_finite() {
            return Err(RankingError::RatingCalculationFailed {
                reason: format!("Rating must be a finite number, got {}", rating),
            }
            .into());
        }

        let write_lock = self.store.write_lock();
        let _guard = write_lock.lock().await;
        let mut player = self.read_or_default(name)?;
        player.rating = rating;
        player.last_updated = crate::utils::current_timestamp();

        self.write(|store| store.update_player(player.clone()))?;
        info!("Rating of {} set to {:.1}", name, rating);
        Ok(player)
    }

    /// Put a stored player back at the initial rating
    pub async fn reset_rating(&self, name: &str) -> Result<Player> {
        let write_lock = self.store.write_lock();
        let _guard = write_lock.lock().await;
        let mut player = self.require_player(name)?;
        player.rating = self.config.initial_rating;
        player.last_updated = crate::utils::current_timestamp();

        self.write(|store| store.update_player(player.clone()))?;
        info!("Rating of {} reset to {:.1}", name, player.rating);
        Ok(player)
    }

    /// Remove a stored player
    pub async fn delete_player(&self, name: &str) -> Result<()> {
        let write_lock = self.store.write_lock();
        let _guard = write_lock.lock().await;
        self.require_player(name)?;

        self.write(|store| store.delete_player(name))?;
        info!("Deleted player {}", name);
        Ok(())
    }

    pub fn player_count(&self) -> Result<usize> {
        self.store.player_count()
    }

    fn require_player(&self, name: &str) -> Result<Player> {
        self.store
            .read_player(name, false)?
            .ok_or_else(|| {
                RankingError::PlayerNotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    fn read_or_default(&self, name: &str) -> Result<Player> {
        self.store
            .read_player(name, true)?
            .ok_or_else(|| {
                RankingError::PlayerNotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Stage one write and commit it, rolling back on failure
    fn write(&self, stage: impl FnOnce(&dyn PlayerStore) -> Result<()>) -> Result<()> {
        let outcome = stage(self.store.as_ref()).and_then(|_| self.store.commit());

        if let Err(e) = outcome {
            if let Err(rollback_error) = self.store.rollback() {
                error!("Rollback failed: {:#}", rollback_error);
            }
            return Err(RankingError::PersistenceFailed {
                message: format!("{:#}", e),
            }
            .into());
        }
        Ok(())
    }
}
