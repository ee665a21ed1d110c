//! Metrics and monitoring for the session-elo service
//!
//! This module provides Prometheus metrics collection and the HTTP health
//! endpoints that expose them.

pub mod collector;
pub mod health;

pub use collector::{
    MetricsCollector, MetricsTimer, PerformanceMetrics, RatingMetrics, ServiceMetrics,
    SessionMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
