//! Player storage interface and implementations
//!
//! This module defines the interface for persisting and retrieving players,
//! with an in-memory implementation that can mirror itself to a JSON snapshot.
//!
//! Writes are staged with `update_player`/`delete_player` and only become
//! visible to readers on `commit`, all at once. The staging area is shared by
//! every writer, so a writer holds the store's [`WriteLock`] from the first
//! staged write until its commit or rollback.

use crate::config::RatingConfig;
use crate::error::{RankingError, Result};
use crate::types::{Player, PlayerName};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Serializes write transactions against one store
pub type WriteLock = Arc<tokio::sync::Mutex<()>>;

/// Trait for player storage operations
pub trait PlayerStore: Send + Sync {
    /// Fetch a committed player by name, optionally creating a fresh one
    ///
    /// A created player is not persisted until it is updated and committed.
    fn read_player(&self, name: &str, create_if_not_found: bool) -> Result<Option<Player>>;

    /// Stage an insert-or-replace of a player
    fn update_player(&self, player: Player) -> Result<()>;

    /// Stage the removal of a player
    fn delete_player(&self, name: &str) -> Result<()>;

    /// Make every staged write visible at once
    fn commit(&self) -> Result<()>;

    /// Discard every staged write
    fn rollback(&self) -> Result<()>;

    /// Committed players ordered by rating descending, ties by name
    fn get_leaderboard(&self, amount: usize, offset: usize) -> Result<Vec<Player>>;

    /// 1-based position the player would have on the leaderboard
    fn get_ranking(&self, player: &Player) -> Result<usize>;

    /// Number of committed players
    fn player_count(&self) -> Result<usize>;

    /// The lock every writer holds for the duration of one transaction
    fn write_lock(&self) -> WriteLock;
}

/// Leaderboard order: higher rating first, then name ascending
pub fn leaderboard_order(a: &Player, b: &Player) -> Ordering {
    b.rating
        .partial_cmp(&a.rating)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

/// A write waiting for the next commit
#[derive(Debug, Clone)]
enum StagedWrite {
    Upsert(Player),
    Delete(PlayerName),
}

/// In-memory player store, optionally backed by a JSON snapshot file
#[derive(Debug)]
pub struct InMemoryPlayerStore {
    players: RwLock<HashMap<PlayerName, Player>>,
    staged: Mutex<Vec<StagedWrite>>,
    initial_rating: f64,
    default_k_factor: f64,
    snapshot_path: Option<PathBuf>,
    write_lock: WriteLock,
}

impl InMemoryPlayerStore {
    /// Create an empty store that creates players with the configured defaults
    pub fn new(config: &RatingConfig) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            staged: Mutex::new(Vec::new()),
            initial_rating: config.initial_rating,
            default_k_factor: config.default_k_factor,
            snapshot_path: None,
            write_lock: WriteLock::default(),
        }
    }

    /// Open a store mirrored to `path`, loading the snapshot if it exists
    pub fn open(path: impl Into<PathBuf>, config: &RatingConfig) -> Result<Self> {
        let path = path.into();
        let mut store = Self::new(config);

        if path.exists() {
            let players = load_snapshot(&path)?;
            info!(
                "Loaded {} players from snapshot {}",
                players.len(),
                path.display()
            );
            store.players = RwLock::new(
                players
                    .into_iter()
                    .map(|player| (player.name.clone(), player))
                    .collect(),
            );
        } else {
            info!(
                "No snapshot at {}, starting with an empty store",
                path.display()
            );
        }

        store.snapshot_path = Some(path);
        Ok(store)
    }

    /// Number of writes waiting for commit
    pub fn staged_len(&self) -> Result<usize> {
        Ok(self.lock_staged()?.len())
    }

    fn lock_staged(&self) -> Result<std::sync::MutexGuard<'_, Vec<StagedWrite>>> {
        self.staged.lock().map_err(|_| {
            RankingError::InternalError {
                message: "Failed to acquire staged writes lock".to_string(),
            }
            .into()
        })
    }

    fn read_players(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<PlayerName, Player>>> {
        self.players.read().map_err(|_| {
            RankingError::InternalError {
                message: "Failed to acquire players read lock".to_string(),
            }
            .into()
        })
    }
}

impl Default for InMemoryPlayerStore {
    fn default() -> Self {
        Self::new(&RatingConfig::default())
    }
}

impl PlayerStore for InMemoryPlayerStore {
    fn read_player(&self, name: &str, create_if_not_found: bool) -> Result<Option<Player>> {
        let players = self.read_players()?;

        match players.get(name) {
            Some(player) => Ok(Some(player.clone())),
            None if create_if_not_found => {
                debug!("Player {} does not exist, creating one", name);
                Ok(Some(Player::with_rating(
                    name,
                    self.initial_rating,
                    self.default_k_factor,
                )))
            }
            None => Ok(None),
        }
    }

    fn update_player(&self, player: Player) -> Result<()> {
        self.lock_staged()?.push(StagedWrite::Upsert(player));
        Ok(())
    }

    fn delete_player(&self, name: &str) -> Result<()> {
        self.lock_staged()?
            .push(StagedWrite::Delete(name.to_string()));
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let staged: Vec<StagedWrite> = std::mem::take(&mut *self.lock_staged()?);
        if staged.is_empty() {
            return Ok(());
        }

        let mut players = self
            .players
            .write()
            .map_err(|_| RankingError::InternalError {
                message: "Failed to acquire players write lock".to_string(),
            })?;

        let mut next = players.clone();
        for write in staged {
            match write {
                StagedWrite::Upsert(player) => {
                    next.insert(player.name.clone(), player);
                }
                StagedWrite::Delete(name) => {
                    if next.remove(&name).is_none() {
                        warn!("Deleting unknown player {}", name);
                    }
                }
            }
        }

        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &next)?;
        }

        *players = next;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut staged = self.lock_staged()?;
        if !staged.is_empty() {
            debug!("Discarding {} staged writes", staged.len());
        }
        staged.clear();
        Ok(())
    }

    fn get_leaderboard(&self, amount: usize, offset: usize) -> Result<Vec<Player>> {
        let players = self.read_players()?;

        let mut ordered: Vec<Player> = players.values().cloned().collect();
        ordered.sort_by(leaderboard_order);

        Ok(ordered.into_iter().skip(offset).take(amount).collect())
    }

    fn get_ranking(&self, player: &Player) -> Result<usize> {
        let players = self.read_players()?;

        let ahead = players
            .values()
            .filter(|other| other.name != player.name)
            .filter(|other| leaderboard_order(other, player) == Ordering::Less)
            .count();

        Ok(ahead + 1)
    }

    fn player_count(&self) -> Result<usize> {
        Ok(self.read_players()?.len())
    }

    fn write_lock(&self) -> WriteLock {
        self.write_lock.clone()
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<Player>> {
    let contents = std::fs::read(path).map_err(|e| RankingError::PersistenceFailed {
        message: format!("Failed to read snapshot {}: {}", path.display(), e),
    })?;

    serde_json::from_slice(&contents).map_err(|e| {
        RankingError::PersistenceFailed {
            message: format!("Corrupt snapshot {}: {}", path.display(), e),
        }
        .into()
    })
}

/// Replace the snapshot file, never leaving a half-written one behind
fn write_snapshot(path: &Path, players: &HashMap<PlayerName, Player>) -> Result<()> {
    let mut ordered: Vec<&Player> = players.values().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let json = serde_json::to_vec_pretty(&ordered).map_err(|e| RankingError::PersistenceFailed {
        message: format!("Failed to encode snapshot: {}", e),
    })?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)
        .and_then(|_| std::fs::rename(&tmp_path, path))
        .map_err(|e| {
            RankingError::PersistenceFailed {
                message: format!("Failed to write snapshot {}: {}", path.display(), e),
            }
            .into()
        })
}

/// Player store with failure injection for testing
///
/// Behaves like [`InMemoryPlayerStore`] and records every call.
#[derive(Debug, Default)]
pub struct MockPlayerStore {
    inner: InMemoryPlayerStore,
    update_calls: Mutex<Vec<Player>>,
    commit_calls: Mutex<usize>,
    rollback_calls: Mutex<usize>,
    fail_commit: Mutex<bool>,
    fail_update_for: Mutex<Option<PlayerName>>,
}

impl MockPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail (staged writes are discarded)
    pub fn set_fail_commit(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_commit.lock() {
            *flag = fail;
        }
    }

    /// Make updates of the named player fail
    pub fn set_fail_update_for(&self, name: Option<&str>) {
        if let Ok(mut target) = self.fail_update_for.lock() {
            *target = name.map(str::to_string);
        }
    }

    /// Preset a committed player
    pub fn preset_player(&self, player: Player) -> Result<()> {
        self.inner.update_player(player)?;
        self.inner.commit()
    }

    /// Get all update calls made (for testing)
    pub fn get_update_calls(&self) -> Vec<Player> {
        self.update_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn commit_count(&self) -> usize {
        self.commit_calls.lock().map(|c| *c).unwrap_or_default()
    }

    pub fn rollback_count(&self) -> usize {
        self.rollback_calls.lock().map(|c| *c).unwrap_or_default()
    }
}

impl PlayerStore for MockPlayerStore {
    fn read_player(&self, name: &str, create_if_not_found: bool) -> Result<Option<Player>> {
        self.inner.read_player(name, create_if_not_found)
    }

    fn update_player(&self, player: Player) -> Result<()> {
        if let Ok(mut calls) = self.update_calls.lock() {
            calls.push(player.clone());
        }

        let should_fail = self
            .fail_update_for
            .lock()
            .map(|target| target.as_deref() == Some(player.name.as_str()))
            .unwrap_or(false);
        if should_fail {
            return Err(RankingError::PersistenceFailed {
                message: format!("Injected update failure for {}", player.name),
            }
            .into());
        }

        self.inner.update_player(player)
    }

    fn delete_player(&self, name: &str) -> Result<()> {
        self.inner.delete_player(name)
    }

    fn commit(&self) -> Result<()> {
        if let Ok(mut count) = self.commit_calls.lock() {
            *count += 1;
        }

        if self.fail_commit.lock().map(|f| *f).unwrap_or(false) {
            self.inner.rollback()?;
            return Err(RankingError::PersistenceFailed {
                message: "Injected commit failure".to_string(),
            }
            .into());
        }

        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        if let Ok(mut count) = self.rollback_calls.lock() {
            *count += 1;
        }
        self.inner.rollback()
    }

    fn get_leaderboard(&self, amount: usize, offset: usize) -> Result<Vec<Player>> {
        self.inner.get_leaderboard(amount, offset)
    }

    fn get_ranking(&self, player: &Player) -> Result<usize> {
        self.inner.get_ranking(player)
    }

    fn player_count(&self) -> Result<usize> {
        self.inner.player_count()
    }

    fn write_lock(&self) -> WriteLock {
        self.inner.write_lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(players: &[(&str, f64)]) -> InMemoryPlayerStore {
        let store = InMemoryPlayerStore::default();
        for (name, rating) in players {
            store
                .update_player(Player::with_rating(*name, *rating, 32.0))
                .unwrap();
        }
        store.commit().unwrap();
        store
    }

    #[test]
    fn test_read_player_creates_only_when_asked() {
        let store = InMemoryPlayerStore::default();

        assert!(store.read_player("Alice", false).unwrap().is_none());

        let created = store.read_player("Alice", true).unwrap().unwrap();
        assert_eq!(created.rating, 1000.0);
        assert_eq!(created.k_factor, 32.0);

        // Creation alone does not persist
        assert_eq!(store.player_count().unwrap(), 0);
    }

    #[test]
    fn test_store_uses_configured_defaults() {
        let config = RatingConfig {
            initial_rating: 1500.0,
            default_k_factor: 24.0,
            ..RatingConfig::default()
        };
        let store = InMemoryPlayerStore::new(&config);

        let created = store.read_player("Dana", true).unwrap().unwrap();
        assert_eq!(created.rating, 1500.0);
        assert_eq!(created.k_factor, 24.0);
    }

    #[test]
    fn test_updates_invisible_until_commit() {
        let store = InMemoryPlayerStore::default();
        store
            .update_player(Player::with_rating("Alice", 1200.0, 32.0))
            .unwrap();
        store
            .update_player(Player::with_rating("Bob", 1400.0, 32.0))
            .unwrap();

        assert!(store.read_player("Alice", false).unwrap().is_none());
        assert_eq!(store.staged_len().unwrap(), 2);

        store.commit().unwrap();

        assert_eq!(store.player_count().unwrap(), 2);
        assert_eq!(store.staged_len().unwrap(), 0);
        assert_eq!(
            store.read_player("Bob", false).unwrap().unwrap().rating,
            1400.0
        );
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let store = store_with(&[("Alice", 1200.0)]);
        store
            .update_player(Player::with_rating("Alice", 9999.0, 32.0))
            .unwrap();

        store.rollback().unwrap();
        store.commit().unwrap();

        assert_eq!(
            store.read_player("Alice", false).unwrap().unwrap().rating,
            1200.0
        );
    }

    #[test]
    fn test_delete_player() {
        let store = store_with(&[("Alice", 1200.0), ("Bob", 1400.0)]);

        store.delete_player("Alice").unwrap();
        assert_eq!(store.player_count().unwrap(), 2);

        store.commit().unwrap();
        assert!(store.read_player("Alice", false).unwrap().is_none());
        assert_eq!(store.player_count().unwrap(), 1);
    }

    #[test]
    fn test_leaderboard_order_and_ties() {
        let store = store_with(&[
            ("Charlie", 1600.0),
            ("Alice", 1200.0),
            ("Bob", 1400.0),
            ("Aaron", 1400.0),
        ]);

        let board: Vec<String> = store
            .get_leaderboard(10, 0)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(board, vec!["Charlie", "Aaron", "Bob", "Alice"]);
    }

    #[test]
    fn test_leaderboard_pagination() {
        let players: Vec<(String, f64)> = (0..45)
            .map(|i| (format!("player{:02}", i), 2000.0 - i as f64 * 10.0))
            .collect();
        let refs: Vec<(&str, f64)> = players.iter().map(|(n, r)| (n.as_str(), *r)).collect();
        let store = store_with(&refs);

        let page = store.get_leaderboard(20, 20).unwrap();
        assert_eq!(page.len(), 20);
        assert_eq!(page[0].name, "player20");
        assert_eq!(page[19].name, "player39");

        for (i, player) in page.iter().enumerate() {
            assert_eq!(store.get_ranking(player).unwrap(), 21 + i);
        }

        assert_eq!(store.get_leaderboard(20, 40).unwrap().len(), 5);
        assert!(store.get_leaderboard(20, 60).unwrap().is_empty());
    }

    #[test]
    fn test_ranking() {
        let store = store_with(&[("Alice", 1200.0), ("Bob", 1400.0), ("Charlie", 1600.0)]);

        let bob = store.read_player("Bob", false).unwrap().unwrap();
        assert_eq!(store.get_ranking(&bob).unwrap(), 2);

        // A player that is not stored yet ranks where their rating would put them
        let newcomer = Player::with_rating("Zed", 1500.0, 32.0);
        assert_eq!(store.get_ranking(&newcomer).unwrap(), 2);

        let bottom = Player::with_rating("Zoe", 100.0, 32.0);
        assert_eq!(store.get_ranking(&bottom).unwrap(), 4);
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let path = std::env::temp_dir().join(format!("players-{}.json", uuid::Uuid::new_v4()));
        let config = RatingConfig::default();

        {
            let store = InMemoryPlayerStore::open(&path, &config).unwrap();
            store
                .update_player(Player::with_rating("Alice", 1234.5, 32.0))
                .unwrap();
            store.commit().unwrap();
        }

        let reopened = InMemoryPlayerStore::open(&path, &config).unwrap();
        let alice = reopened.read_player("Alice", false).unwrap().unwrap();
        assert_eq!(alice.rating, 1234.5);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_mock_store_failure_injection() {
        let store = MockPlayerStore::new();
        store.set_fail_commit(true);

        store.update_player(Player::new("Alice")).unwrap();
        assert!(store.commit().is_err());
        assert_eq!(store.player_count().unwrap(), 0);

        store.set_fail_commit(false);
        store.set_fail_update_for(Some("Bob"));
        assert!(store.update_player(Player::new("Bob")).is_err());
        assert_eq!(store.get_update_calls().len(), 2);
        assert_eq!(store.commit_count(), 1);
    }
}
