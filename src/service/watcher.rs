//! Match watcher
//!
//! Connects a session driver to the result processor: every batch the
//! driver yields is rated and persisted before the next one is looked at,
//! and the caller receives one [`MatchOutcome`] per cycle.

use crate::error::{is_disconnection, is_persistence_failure, Result};
use crate::rating::ResultProcessor;
use crate::session::SessionDriver;
use crate::types::RatedResult;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

/// What one watch cycle amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Ratings changed and were committed
    Rated(RatedResult),
    /// Nothing to rate (not enough participants)
    NoChange,
}

/// Stream of rated outcomes; errors are operational failures
pub type OutcomeStream = Pin<Box<dyn Stream<Item = Result<MatchOutcome>> + Send>>;

/// Feeds a session's results through the result processor
pub struct MatchWatcher {
    driver: Arc<dyn SessionDriver>,
    processor: ResultProcessor,
}

impl MatchWatcher {
    pub fn new(driver: Arc<dyn SessionDriver>, processor: ResultProcessor) -> Self {
        Self { driver, processor }
    }

    pub fn driver(&self) -> Arc<dyn SessionDriver> {
        self.driver.clone()
    }

    /// Start watching the session and rate each match as it completes
    ///
    /// A persistence failure is reported and watching continues; a driver
    /// failure (such as a lost connection) is reported and ends the stream.
    pub async fn watch(&self) -> Result<OutcomeStream> {
        let mut results = self.driver.watch_and_get_results().await?;
        let processor = self.processor.clone();
        let (outcomes, receiver) = mpsc::channel(1);

        tokio::spawn(async move {
            while let Some(item) = results.next().await {
                let outcome = match item {
                    Ok(Some(batch)) => match processor.process(batch).await {
                        Ok(Some(result)) => Ok(MatchOutcome::Rated(result)),
                        Ok(None) => Ok(MatchOutcome::NoChange),
                        Err(e) => {
                            if is_persistence_failure(&e) {
                                error!("Match results could not be saved: {:#}", e);
                            }
                            Err(e)
                        }
                    },
                    Ok(None) => Ok(MatchOutcome::NoChange),
                    Err(e) => {
                        if is_disconnection(&e) {
                            warn!("Session disconnected: {:#}", e);
                        } else {
                            error!("Session failed: {:#}", e);
                        }
                        Err(e)
                    }
                };

                if outcomes.send(outcome).await.is_err() {
                    info!("Outcome consumer went away, no longer rating matches");
                    break;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(receiver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::rating::{EloRatingEngine, InMemoryPlayerStore, PlayerStore};
    use crate::session::{MatchRoster, MockSessionPlatform, ReportedScore, SessionStateMachine};

    #[tokio::test]
    async fn test_rated_then_no_change() {
        let platform = Arc::new(MockSessionPlatform::new());
        platform.queue_match(
            MatchRoster::new().with("1", "Alice").with("2", "Bob"),
            vec![
                ReportedScore::finished("1", 10.0),
                ReportedScore::finished("2", 5.0),
            ],
        );

        let session = Arc::new(SessionStateMachine::new(
            platform.clone(),
            SessionConfig::fast(),
        ));
        session.create_game(false).await.unwrap();

        let store = Arc::new(InMemoryPlayerStore::default());
        let processor = ResultProcessor::new(store.clone(), Arc::new(EloRatingEngine::default()));
        let watcher = MatchWatcher::new(session.clone(), processor);

        let mut outcomes = watcher.watch().await.unwrap();

        match outcomes.next().await.unwrap().unwrap() {
            MatchOutcome::Rated(result) => {
                assert_eq!(result.delta_for("Alice"), Some(16.0));
                assert_eq!(result.delta_for("Bob"), Some(-16.0));
            }
            other => panic!("expected a rated match, got {:?}", other),
        }
        assert_eq!(store.player_count().unwrap(), 2);

        // No scripted players left, so the participant wait times out
        assert_eq!(
            outcomes.next().await.unwrap().unwrap(),
            MatchOutcome::NoChange
        );

        session.force_quit().await.unwrap();
        assert!(outcomes.next().await.is_none());
    }
}
