//! Session watch-loop timing

use crate::config::app::SessionSettings;
use std::time::Duration;

/// Runtime timing policy of a session state machine
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Total time to wait for at least two registered participants
    pub participant_timeout: Duration,
    /// A "still waiting" notice is sent at the start of each increment
    pub participant_notice_interval: Duration,
    /// Countdown before starting a match
    pub countdown: Duration,
    /// Countdown tick; participants are re-checked on every tick
    pub countdown_step: Duration,
    /// Poll interval while waiting for participants
    pub participant_poll: Duration,
    /// Poll interval for match completion and connectivity
    pub match_poll: Duration,
    /// Stop watching after this many consecutive empty cycles (0 = never)
    pub max_idle_cycles: u32,
    /// Maximum concurrent blocking calls into the platform
    pub driver_workers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default(), 2)
    }
}

impl SessionConfig {
    /// Build the runtime policy from the serializable settings
    pub fn from_settings(settings: &SessionSettings, driver_workers: usize) -> Self {
        Self {
            participant_timeout: Duration::from_secs(settings.participant_timeout_seconds),
            participant_notice_interval: Duration::from_secs(settings.participant_notice_seconds),
            countdown: Duration::from_secs(settings.countdown_seconds),
            countdown_step: Duration::from_secs(settings.countdown_step_seconds),
            participant_poll: Duration::from_millis(settings.participant_poll_ms),
            match_poll: Duration::from_millis(settings.match_poll_ms),
            max_idle_cycles: settings.max_idle_cycles,
            driver_workers: driver_workers.max(1),
        }
    }

    /// Millisecond-scale timings for tests and demos
    pub fn fast() -> Self {
        Self {
            participant_timeout: Duration::from_millis(300),
            participant_notice_interval: Duration::from_millis(100),
            countdown: Duration::from_millis(30),
            countdown_step: Duration::from_millis(10),
            participant_poll: Duration::from_millis(5),
            match_poll: Duration::from_millis(5),
            max_idle_cycles: 0,
            driver_workers: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_settings() {
        let config = SessionConfig::default();
        assert_eq!(config.participant_timeout, Duration::from_secs(300));
        assert_eq!(config.participant_notice_interval, Duration::from_secs(60));
        assert_eq!(config.countdown, Duration::from_secs(30));
        assert_eq!(config.countdown_step, Duration::from_secs(10));
        assert_eq!(config.match_poll, Duration::from_millis(500));
    }

    #[test]
    fn test_driver_workers_never_zero() {
        let config = SessionConfig::from_settings(&SessionSettings::default(), 0);
        assert_eq!(config.driver_workers, 1);
    }
}
