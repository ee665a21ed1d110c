//! Configuration management for the session-elo service
//!
//! This module handles all configuration loading from environment variables
//! and TOML files, validation, and default values for the service.

pub mod app;
pub mod rating;
pub mod session;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings, SessionSettings, StorageSettings};
pub use rating::RatingConfig;
pub use session::SessionConfig;
