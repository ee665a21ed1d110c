//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the session-elo service using
//! Prometheus metrics.

use crate::types::{RatedResult, SessionState};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Session lifecycle metrics
    session_metrics: SessionMetrics,

    /// Rating-related metrics
    rating_metrics: RatingMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,
}

/// Session lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Current state per session (0=stopped, 1=created, 2=watching, 3=running)
    pub session_state: IntGaugeVec,

    /// Matches started
    pub matches_started_total: IntCounter,

    /// Cycles abandoned for lack of participants
    pub idle_cycles_total: IntCounter,

    /// Lost connections to the session platform
    pub disconnections_total: IntCounter,

    /// Notices sent to participants
    pub notices_total: IntCounterVec,
}

/// Rating-related metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Matches whose results changed ratings
    pub matches_rated_total: IntCounter,

    /// Matches that produced no rating change
    pub no_change_matches_total: IntCounter,

    /// Individual player rating updates committed
    pub rating_updates_total: IntCounter,

    /// Batches whose persistence was aborted
    pub persistence_failures_total: IntCounter,

    /// Rating distribution of updated players
    pub rating_distribution: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Result batch processing time, including the commit
    pub result_processing_duration: Histogram,

    /// Rating calculation time
    pub rating_calculation_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            session_metrics,
            rating_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a committed match result
    pub fn record_match_rated(&self, result: &RatedResult, duration: Duration) {
        self.rating_metrics.matches_rated_total.inc();
        self.rating_metrics
            .rating_updates_total
            .inc_by(result.len() as u64);

        for player in result.players() {
            self.rating_metrics.rating_distribution.observe(player.rating);
        }

        self.performance_metrics
            .result_processing_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a match that left every rating untouched
    pub fn record_no_change(&self) {
        self.rating_metrics.no_change_matches_total.inc();
    }

    /// Record an aborted batch persistence
    pub fn record_persistence_failure(&self) {
        self.rating_metrics.persistence_failures_total.inc();
    }

    /// Record rating calculation duration
    pub fn record_rating_calculation(&self, duration: Duration) {
        self.performance_metrics
            .rating_calculation_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a session state transition
    pub fn record_session_state(&self, session: &str, state: SessionState) {
        self.session_metrics
            .session_state
            .with_label_values(&[session])
            .set(state.as_gauge());
    }

    pub fn record_match_started(&self) {
        self.session_metrics.matches_started_total.inc();
    }

    pub fn record_idle_cycle(&self) {
        self.session_metrics.idle_cycles_total.inc();
    }

    pub fn record_disconnection(&self) {
        self.session_metrics.disconnections_total.inc();
    }

    /// Record a notice, split by whether it was delivered or suppressed
    pub fn record_notice(&self, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "suppressed" };
        self.session_metrics
            .notices_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("session_elo_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "session_elo_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let session_state = IntGaugeVec::new(
            Opts::new(
                "session_elo_session_state",
                "Session state (0=stopped, 1=created, 2=watching, 3=running)",
            ),
            &["session"],
        )?;
        registry.register(Box::new(session_state.clone()))?;

        let matches_started_total =
            IntCounter::new("session_elo_matches_started_total", "Total matches started")?;
        registry.register(Box::new(matches_started_total.clone()))?;

        let idle_cycles_total = IntCounter::new(
            "session_elo_idle_cycles_total",
            "Cycles abandoned for lack of participants",
        )?;
        registry.register(Box::new(idle_cycles_total.clone()))?;

        let disconnections_total = IntCounter::new(
            "session_elo_disconnections_total",
            "Lost connections to the session platform",
        )?;
        registry.register(Box::new(disconnections_total.clone()))?;

        let notices_total = IntCounterVec::new(
            Opts::new("session_elo_notices_total", "Notices sent to participants"),
            &["outcome"],
        )?;
        registry.register(Box::new(notices_total.clone()))?;

        Ok(Self {
            session_state,
            matches_started_total,
            idle_cycles_total,
            disconnections_total,
            notices_total,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_rated_total =
            IntCounter::new("session_elo_matches_rated_total", "Total matches rated")?;
        registry.register(Box::new(matches_rated_total.clone()))?;

        let no_change_matches_total = IntCounter::new(
            "session_elo_no_change_matches_total",
            "Matches that produced no rating change",
        )?;
        registry.register(Box::new(no_change_matches_total.clone()))?;

        let rating_updates_total = IntCounter::new(
            "session_elo_rating_updates_total",
            "Player rating updates committed",
        )?;
        registry.register(Box::new(rating_updates_total.clone()))?;

        let persistence_failures_total = IntCounter::new(
            "session_elo_persistence_failures_total",
            "Result batches whose persistence was aborted",
        )?;
        registry.register(Box::new(persistence_failures_total.clone()))?;

        let rating_distribution = Histogram::with_opts(
            HistogramOpts::new(
                "session_elo_rating_distribution",
                "Rating distribution of updated players",
            )
            .buckets(vec![
                500.0, 800.0, 1000.0, 1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2500.0,
            ]),
        )?;
        registry.register(Box::new(rating_distribution.clone()))?;

        Ok(Self {
            matches_rated_total,
            no_change_matches_total,
            rating_updates_total,
            persistence_failures_total,
            rating_distribution,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let result_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "session_elo_result_processing_duration_seconds",
                "Result batch processing time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(result_processing_duration.clone()))?;

        let rating_calculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "session_elo_rating_calculation_duration_seconds",
                "Rating calculation time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05]),
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        Ok(Self {
            result_processing_duration,
            rating_calculation_duration,
        })
    }
}
