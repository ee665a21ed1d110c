//! Session platform capability and the executor that calls into it
//!
//! A platform operates the remote competitive room (browser automation,
//! a game server API, ...). Every call may block on I/O, so the state
//! machine never calls it directly: calls go through a [`PlatformExecutor`]
//! which runs them on the blocking thread pool, at most `workers` at a time.

use crate::error::{RankingError, Result};
use crate::session::results::{MatchRoster, ReportedScore};
use crate::types::JoinReference;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Blocking operations on the remote session platform
pub trait SessionPlatform: Send + Sync + 'static {
    /// Stand up a private room, or start spectating the public live stream
    ///
    /// In live mode the spectate command is always issued.
    fn create_session(&self, live: bool) -> Result<JoinReference>;

    /// Number of registered participants currently present
    fn participant_count(&self) -> Result<usize>;

    /// Start a match and capture the roster of registered participants
    fn start_match(&self) -> Result<MatchRoster>;

    /// Whether the running match has finished
    fn has_match_ended(&self) -> Result<bool>;

    /// Results of the match that just finished
    fn fetch_results(&self) -> Result<Vec<ReportedScore>>;

    /// Fail with [`RankingError::Disconnected`] when the platform is unreachable
    fn check_connection(&self) -> Result<()>;

    /// Post a chat notice in the room
    fn send_notice(&self, text: &str) -> Result<()>;

    /// Tear everything down and log in afresh
    fn reset(&self) -> Result<()>;
}

/// Bounded pool for blocking platform calls
#[derive(Clone)]
pub struct PlatformExecutor {
    platform: Arc<dyn SessionPlatform>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl PlatformExecutor {
    pub fn new(platform: Arc<dyn SessionPlatform>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            platform,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one blocking platform call off the async runtime
    ///
    /// The permit travels with the blocking task, so a call abandoned by a
    /// cancelled caller keeps its slot until it actually returns.
    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&dyn SessionPlatform) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RankingError::InternalError {
                message: "Platform executor closed".to_string(),
            })?;
        let platform = self.platform.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            call(platform.as_ref())
        })
        .await
        .map_err(|e| RankingError::DriverFault {
            message: format!("Platform call panicked or was aborted: {}", e),
        })?
    }
}
