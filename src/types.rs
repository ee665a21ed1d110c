//! Common types used throughout the rating service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistence key of a player (the display name reported by the platform)
pub type PlayerName = String;

/// Platform-specific identifier of a participant, only used for de-duplication
pub type ParticipantId = String;

/// Unique identifier for a watched session
pub type SessionId = Uuid;

/// Link handed out so people can join the session ("live" when spectating)
pub type JoinReference = String;

/// Join reference used when watching the public live stream
pub const LIVE_JOIN_REFERENCE: &str = "live";

/// Rating given to players on their first appearance
pub const DEFAULT_RATING: f64 = 1000.0;

/// Rating volatility given to players on their first appearance
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Lifecycle state of one watched session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Stopped,
    Created,
    Watching,
    Running,
}

impl SessionState {
    /// Numeric encoding used by the state gauge
    pub fn as_gauge(self) -> i64 {
        match self {
            SessionState::Stopped => 0,
            SessionState::Created => 1,
            SessionState::Watching => 2,
            SessionState::Running => 3,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Stopped => write!(f, "STOPPED"),
            SessionState::Created => write!(f, "CREATED"),
            SessionState::Watching => write!(f, "WATCHING"),
            SessionState::Running => write!(f, "RUNNING"),
        }
    }
}

/// A rated participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: PlayerName,
    pub rating: f64,
    pub k_factor: f64,
    #[serde(default)]
    pub games_played: u64,
    #[serde(default = "crate::utils::current_timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl Player {
    /// Create a player with the default rating and K-factor
    pub fn new(name: impl Into<PlayerName>) -> Self {
        Self::with_rating(name, DEFAULT_RATING, DEFAULT_K_FACTOR)
    }

    /// Create a player with an explicit rating and K-factor
    pub fn with_rating(name: impl Into<PlayerName>, rating: f64, k_factor: f64) -> Self {
        Self {
            name: name.into(),
            rating,
            k_factor,
            games_played: 0,
            last_updated: crate::utils::current_timestamp(),
        }
    }

    /// Rating rounded to the nearest whole point, as shown to people
    pub fn display_rating(&self) -> i64 {
        self.rating.round() as i64
    }

    /// Apply the summed delta of one completed match
    pub fn apply_match_delta(&mut self, delta: f64) {
        self.rating += delta;
        self.games_played += 1;
        self.last_updated = crate::utils::current_timestamp();
    }
}

/// One participant's raw performance in a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub id: ParticipantId,
    pub display_name: String,
    /// Non-negative performance measure; 0.0 means forfeited or never reported
    pub score: f64,
}

impl RawResult {
    pub fn new(id: impl Into<ParticipantId>, display_name: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            score,
        }
    }
}

/// Every registered participant of one match, each exactly once
pub type RawResultBatch = Vec<RawResult>;

/// A player's standing in one rated match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedEntry {
    /// The player with the delta already applied
    pub player: Player,
    pub score: f64,
    pub delta: f64,
}

/// Rating outcome of one completed match, in original entry order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedResult {
    pub entries: Vec<RatedEntry>,
}

impl RatedResult {
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.entries.iter().map(|entry| &entry.player)
    }

    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|entry| entry.score)
    }

    pub fn deltas(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|entry| entry.delta)
    }

    /// Delta applied to the named player, if they took part
    pub fn delta_for(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.player.name == name)
            .map(|entry| entry.delta)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
