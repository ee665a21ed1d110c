//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use session_elo::config::SessionConfig;
use session_elo::rating::{EloRatingEngine, MockPlayerStore, ResultProcessor};
use session_elo::service::MatchWatcher;
use session_elo::session::{
    MatchRoster, MockSessionPlatform, ReportedScore, SessionDriver, SessionStateMachine,
};
use session_elo::types::SessionState;
use std::sync::Arc;
use std::time::Duration;

/// A complete session wired to a recording player store
pub struct TestSystem {
    pub platform: Arc<MockSessionPlatform>,
    pub session: Arc<SessionStateMachine>,
    pub store: Arc<MockPlayerStore>,
    pub processor: ResultProcessor,
}

impl TestSystem {
    pub fn watcher(&self) -> MatchWatcher {
        MatchWatcher::new(self.session.clone(), self.processor.clone())
    }
}

/// Integration test setup that creates a complete system
pub fn create_test_system(config: SessionConfig) -> TestSystem {
    let platform = Arc::new(MockSessionPlatform::new());
    let session = Arc::new(SessionStateMachine::new(platform.clone(), config));
    let store = Arc::new(MockPlayerStore::new());
    let processor = ResultProcessor::new(store.clone(), Arc::new(EloRatingEngine::default()));

    TestSystem {
        platform,
        session,
        store,
        processor,
    }
}

/// Millisecond timings with a participant wait far longer than any test
pub fn long_wait_config() -> SessionConfig {
    SessionConfig {
        participant_timeout: Duration::from_secs(300),
        participant_notice_interval: Duration::from_secs(60),
        participant_poll: Duration::from_millis(20),
        ..SessionConfig::fast()
    }
}

/// Queue a match where every participant finishes with the given score
pub fn queue_finished_match(platform: &MockSessionPlatform, results: &[(&str, f64)]) {
    let mut roster = MatchRoster::new();
    let mut reports = Vec::new();

    for (seat, (name, score)) in results.iter().enumerate() {
        let id = format!("{}-{}", seat, name);
        roster.register(id.clone(), *name);
        reports.push(ReportedScore::finished(id, *score));
    }

    platform.queue_match(roster, reports);
}

/// Poll until the session reaches `state`, giving up after two seconds
pub async fn wait_for_state(session: &SessionStateMachine, state: SessionState) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if session.get_state().await == state {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    false
}

/// Poll until the platform has received a notice starting with `prefix`
pub async fn wait_for_notice(platform: &MockSessionPlatform, prefix: &str) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if platform
            .notices()
            .iter()
            .any(|notice| notice.starts_with(prefix))
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    false
}
