//! Result processing
//!
//! Turns one raw result batch into a rated, persisted outcome: players are
//! looked up (or created) by display name, the batch is rated, and every
//! touched player is written and committed as one unit.

use crate::error::{RankingError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::engine::RatingEngine;
use crate::rating::storage::PlayerStore;
use crate::types::{Player, RatedResult, RawResultBatch};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Rates result batches and persists the outcome
///
/// Only one batch (or administrative write) is in flight per store at a
/// time, however many processors share the store.
#[derive(Clone)]
pub struct ResultProcessor {
    store: Arc<dyn PlayerStore>,
    engine: Arc<dyn RatingEngine>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ResultProcessor {
    pub fn new(store: Arc<dyn PlayerStore>, engine: Arc<dyn RatingEngine>) -> Self {
        Self {
            store,
            engine,
            metrics: None,
        }
    }

    /// Record processing outcomes in the given collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> Arc<dyn PlayerStore> {
        self.store.clone()
    }

    pub fn engine(&self) -> Arc<dyn RatingEngine> {
        self.engine.clone()
    }

    /// Rate and persist one match
    ///
    /// Returns `Ok(None)` without writing anything when fewer than two
    /// distinct players took part. A failed write or commit rolls back the
    /// whole batch and surfaces as [`RankingError::PersistenceFailed`].
    pub async fn process(&self, batch: RawResultBatch) -> Result<Option<RatedResult>> {
        let write_lock = self.store.write_lock();
        let _guard = write_lock.lock().await;
        let started = Instant::now();

        let mut seen = HashSet::new();
        let mut entries: Vec<(Player, f64)> = Vec::with_capacity(batch.len());
        for raw in batch {
            if !seen.insert(raw.display_name.clone()) {
                warn!(
                    "Ignoring duplicate result for {} (id {})",
                    raw.display_name, raw.id
                );
                continue;
            }

            let player = self
                .store
                .read_player(&raw.display_name, true)?
                .ok_or_else(|| RankingError::PlayerNotFound {
                    name: raw.display_name.clone(),
                })?;
            entries.push((player, raw.score));
        }

        let calculation_started = Instant::now();
        let result = self.engine.report_game(entries);
        if let Some(metrics) = &self.metrics {
            metrics.record_rating_calculation(calculation_started.elapsed());
        }

        let Some(result) = result else {
            debug!("Fewer than two players, no ratings changed");
            if let Some(metrics) = &self.metrics {
                metrics.record_no_change();
            }
            return Ok(None);
        };

        if let Err(e) = self.persist(&result) {
            error!("Aborting result persistence: {:#}", e);
            if let Err(rollback_error) = self.store.rollback() {
                error!("Rollback failed: {:#}", rollback_error);
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_persistence_failure();
            }
            return Err(RankingError::PersistenceFailed {
                message: format!("{:#}", e),
            }
            .into());
        }

        info!("Rated match with {} players", result.len());
        if let Some(metrics) = &self.metrics {
            metrics.record_match_rated(&result, started.elapsed());
        }

        Ok(Some(result))
    }

    fn persist(&self, result: &RatedResult) -> Result<()> {
        for player in result.players() {
            self.store.update_player(player.clone())?;
        }
        self.store.commit()
    }
}
