//! Session driver contract
//!
//! The async surface the rest of the service uses to run one session:
//! create it, watch it for results, and stop it.

use crate::error::Result;
use crate::types::{JoinReference, RawResultBatch, SessionState};
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// One item per finished cycle of the watch loop
///
/// `Ok(Some(batch))` for a played match, `Ok(None)` for a cycle abandoned for
/// lack of participants, `Err(_)` for the failure that ended the loop. The
/// stream closes when the loop ends.
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<Option<RawResultBatch>>> + Send>>;

/// Lifecycle operations of one competitive session
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Stand up a session (or join the live stream); only allowed from STOPPED
    async fn create_game(&self, live: bool) -> Result<JoinReference>;

    async fn get_state(&self) -> SessionState;

    /// Link people use to join, `None` while STOPPED
    async fn join_reference(&self) -> Option<JoinReference>;

    /// Start the watch loop and hand back its result stream
    async fn watch_and_get_results(&self) -> Result<ResultStream>;

    /// Ask the watch loop to stop at the next safe point between matches
    async fn quit(&self);

    /// Abandon whatever the loop is waiting on, reset the platform, and stop
    async fn force_quit(&self) -> Result<()>;
}
