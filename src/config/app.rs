//! Main application configuration
//!
//! This module defines the primary configuration structures for the session-elo
//! service, including environment variable and TOML loading and validation.

use crate::config::rating::RatingConfig;
use crate::config::session::SessionConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub session: SessionSettings,
    pub rating: RatingConfig,
    pub storage: StorageSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health and metrics endpoints; disabled when unset
    pub metrics_port: Option<u16>,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Maximum concurrent blocking calls into the session platform
    pub driver_workers: usize,
}

/// Timing policy of the watch loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Total time to wait for two registered participants
    pub participant_timeout_seconds: u64,
    /// Interval between "still waiting" notices
    pub participant_notice_seconds: u64,
    /// Countdown before a match starts
    pub countdown_seconds: u64,
    /// Countdown tick length
    pub countdown_step_seconds: u64,
    /// Poll interval while waiting for participants
    pub participant_poll_ms: u64,
    /// Poll interval while a match is running
    pub match_poll_ms: u64,
    /// Stop watching after this many consecutive empty cycles (0 = never)
    pub max_idle_cycles: u32,
    /// Spectate the public live stream instead of creating a private lobby
    pub live: bool,
}

/// Player store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON snapshot file backing the player store; in-memory only when unset
    pub player_store_path: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "session-elo".to_string(),
            log_level: "info".to_string(),
            metrics_port: None,
            shutdown_timeout_seconds: 30,
            driver_workers: 2,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            participant_timeout_seconds: 300, // 5 minutes
            participant_notice_seconds: 60,
            countdown_seconds: 30,
            countdown_step_seconds: 10,
            participant_poll_ms: 100,
            match_poll_ms: 500,
            max_idle_cycles: 0,
            live: false,
        }
    }
}

/// Parse an environment variable if it is set
fn env_override<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Some(name) = env_override("SERVICE_NAME")? {
            self.service.name = name;
        }
        if let Some(log_level) = env_override("LOG_LEVEL")? {
            self.service.log_level = log_level;
        }
        if let Some(port) = env_override("METRICS_PORT")? {
            self.service.metrics_port = Some(port);
        }
        if let Some(workers) = env_override("DRIVER_WORKERS")? {
            self.service.driver_workers = workers;
        }

        // Session settings
        if let Some(timeout) = env_override("PARTICIPANT_TIMEOUT_SECONDS")? {
            self.session.participant_timeout_seconds = timeout;
        }
        if let Some(notice) = env_override("PARTICIPANT_NOTICE_SECONDS")? {
            self.session.participant_notice_seconds = notice;
        }
        if let Some(countdown) = env_override("COUNTDOWN_SECONDS")? {
            self.session.countdown_seconds = countdown;
        }
        if let Some(step) = env_override("COUNTDOWN_STEP_SECONDS")? {
            self.session.countdown_step_seconds = step;
        }
        if let Some(idle) = env_override("MAX_IDLE_CYCLES")? {
            self.session.max_idle_cycles = idle;
        }

        // Rating settings
        if let Some(rating) = env_override("INITIAL_RATING")? {
            self.rating.initial_rating = rating;
        }
        if let Some(k_factor) = env_override("DEFAULT_K_FACTOR")? {
            self.rating.default_k_factor = k_factor;
        }
        if let Some(scale) = env_override("ELO_SCALE")? {
            self.rating.scale = scale;
        }

        // Storage settings
        if let Some(path) = env_override::<PathBuf>("PLAYER_STORE_PATH")? {
            self.storage.player_store_path = Some(path);
        }

        Ok(())
    }

    /// Runtime timing policy for a session state machine
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from_settings(&self.session, self.service.driver_workers)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.metrics_port == Some(0) {
        return Err(anyhow!("Metrics port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.driver_workers == 0 {
        return Err(anyhow!("At least one driver worker is required"));
    }

    // Validate session timing
    let session = &config.session;
    if session.participant_timeout_seconds == 0 {
        return Err(anyhow!("Participant timeout must be greater than 0"));
    }
    if session.participant_notice_seconds == 0 {
        return Err(anyhow!("Participant notice interval must be greater than 0"));
    }
    if session.countdown_step_seconds == 0 && session.countdown_seconds > 0 {
        return Err(anyhow!("Countdown step must be greater than 0"));
    }
    if session.countdown_step_seconds > session.countdown_seconds {
        return Err(anyhow!(
            "Countdown step ({}s) cannot exceed the countdown ({}s)",
            session.countdown_step_seconds,
            session.countdown_seconds
        ));
    }
    if session.participant_poll_ms == 0 || session.match_poll_ms == 0 {
        return Err(anyhow!("Poll intervals must be greater than 0"));
    }

    config.rating.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.session.participant_timeout_seconds, 300);
        assert_eq!(config.session.participant_notice_seconds, 60);
        assert_eq!(config.session.countdown_seconds, 30);
        assert_eq!(config.session.countdown_step_seconds, 10);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_countdown_step_larger_than_countdown_rejected() {
        let mut config = AppConfig::default();
        config.session.countdown_seconds = 5;
        config.session.countdown_step_seconds = 10;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [session]
            countdown_seconds = 20
            live = true

            [rating]
            default_k_factor = 24.0
            "#,
        )
        .unwrap();

        assert_eq!(config.session.countdown_seconds, 20);
        assert!(config.session.live);
        assert_eq!(config.session.participant_timeout_seconds, 300);
        assert_eq!(config.rating.default_k_factor, 24.0);
        assert_eq!(config.rating.scale, 400.0);
        assert_eq!(config.service.name, "session-elo");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_session_settings_reach_session_config() {
        let mut config = AppConfig::default();
        config.session.participant_timeout_seconds = 120;
        config.session.countdown_seconds = 15;
        config.session.countdown_step_seconds = 5;
        config.session.max_idle_cycles = 3;
        config.service.driver_workers = 4;

        let session = config.session_config();
        assert_eq!(session.participant_timeout, Duration::from_secs(120));
        assert_eq!(session.countdown, Duration::from_secs(15));
        assert_eq!(session.countdown_step, Duration::from_secs(5));
        assert_eq!(session.participant_poll, Duration::from_millis(100));
        assert_eq!(session.max_idle_cycles, 3);
        assert_eq!(session.driver_workers, 4);
    }

    #[test]
    fn test_from_file_round_trip() {
        let path = std::env::temp_dir().join(format!("session-elo-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[service]\nlog_level = \"debug\"\ndriver_workers = 4\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.service.driver_workers, 4);

        std::fs::remove_file(&path).ok();
    }
}
