//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for team balancing and rating
//! updates using Prometheus metrics on a private registry.

use crate::rating::RatingUpdate;
use crate::types::{BalanceResult, SchemeKind};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the engine
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Balancing metrics
    balance_metrics: BalanceMetrics,

    /// Rating update metrics
    rating_metrics: RatingMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Balancing metrics
#[derive(Clone)]
pub struct BalanceMetrics {
    /// Successful balancing requests by strategy
    pub balance_requests_total: IntCounterVec,

    /// Rejected or failed balancing requests by error kind
    pub balance_failures_total: IntCounterVec,

    /// Standard deviation of team averages
    pub balance_score: Histogram,

    /// Players per balancing request
    pub roster_size: Histogram,
}

/// Rating update metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Completed rating updates by scheme
    pub rating_updates_total: IntCounterVec,

    /// Rating updates rejected by scheme and error kind
    pub rating_failures_total: IntCounterVec,

    /// Multi-team updates that kept ratings unchanged
    pub degraded_updates_total: IntCounter,

    /// Absolute per-player rating change by scheme
    pub rating_change: HistogramVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Balancing time
    pub balance_duration: Histogram,

    /// Rating calculation time by scheme
    pub rating_calculation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let balance_metrics = BalanceMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            balance_metrics,
            rating_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get balancing metrics
    pub fn balance(&self) -> &BalanceMetrics {
        &self.balance_metrics
    }

    /// Get rating metrics
    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a successful balancing request
    pub fn record_balance(&self, result: &BalanceResult, duration: Duration) {
        self.balance_metrics
            .balance_requests_total
            .with_label_values(&[result.strategy.as_str()])
            .inc();
        self.balance_metrics
            .balance_score
            .observe(result.balance_score);
        self.balance_metrics
            .roster_size
            .observe(result.player_count() as f64);
        self.performance_metrics
            .balance_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a balancing request that returned an error
    pub fn record_balance_failure(&self, kind: &str) {
        self.balance_metrics
            .balance_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a computed rating update
    pub fn record_rating_update(&self, update: &RatingUpdate, duration: Duration) {
        let scheme = update.scheme.as_str();
        self.rating_metrics
            .rating_updates_total
            .with_label_values(&[scheme])
            .inc();
        if update.is_degraded() {
            self.rating_metrics.degraded_updates_total.inc();
        }
        for change in &update.changes {
            self.rating_metrics
                .rating_change
                .with_label_values(&[scheme])
                .observe(change.delta().abs());
        }
        self.performance_metrics
            .rating_calculation_duration
            .with_label_values(&[scheme])
            .observe(duration.as_secs_f64());
    }

    /// Record a rating update that returned an error
    pub fn record_rating_failure(&self, scheme: SchemeKind, kind: &str) {
        self.rating_metrics
            .rating_failures_total
            .with_label_values(&[scheme.as_str(), kind])
            .inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
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

impl BalanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let balance_requests_total = IntCounterVec::new(
            Opts::new(
                "teamforge_balance_requests_total",
                "Total successful balancing requests",
            ),
            &["strategy"],
        )?;
        registry.register(Box::new(balance_requests_total.clone()))?;

        let balance_failures_total = IntCounterVec::new(
            Opts::new(
                "teamforge_balance_failures_total",
                "Total rejected balancing requests",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(balance_failures_total.clone()))?;

        let balance_score = Histogram::with_opts(
            HistogramOpts::new(
                "teamforge_balance_score",
                "Standard deviation of team average ratings",
            )
            .buckets(vec![0.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 400.0]),
        )?;
        registry.register(Box::new(balance_score.clone()))?;

        let roster_size = Histogram::with_opts(
            HistogramOpts::new("teamforge_roster_size", "Players per balancing request")
                .buckets(vec![2.0, 4.0, 5.0, 8.0, 12.0, 16.0, 20.0, 24.0]),
        )?;
        registry.register(Box::new(roster_size.clone()))?;

        Ok(Self {
            balance_requests_total,
            balance_failures_total,
            balance_score,
            roster_size,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_updates_total = IntCounterVec::new(
            Opts::new("teamforge_rating_updates_total", "Total rating updates"),
            &["scheme"],
        )?;
        registry.register(Box::new(rating_updates_total.clone()))?;

        let rating_failures_total = IntCounterVec::new(
            Opts::new(
                "teamforge_rating_failures_total",
                "Total rejected rating updates",
            ),
            &["scheme", "kind"],
        )?;
        registry.register(Box::new(rating_failures_total.clone()))?;

        let degraded_updates_total = IntCounter::new(
            "teamforge_degraded_updates_total",
            "Multi-team updates that kept ratings unchanged",
        )?;
        registry.register(Box::new(degraded_updates_total.clone()))?;

        let rating_change = HistogramVec::new(
            HistogramOpts::new(
                "teamforge_rating_change",
                "Absolute rating change per player",
            )
            .buckets(vec![0.5, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 150.0]),
            &["scheme"],
        )?;
        registry.register(Box::new(rating_change.clone()))?;

        Ok(Self {
            rating_updates_total,
            rating_failures_total,
            degraded_updates_total,
            rating_change,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let balance_duration = Histogram::with_opts(
            HistogramOpts::new(
                "teamforge_balance_duration_seconds",
                "Time spent balancing a roster",
            )
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01]),
        )?;
        registry.register(Box::new(balance_duration.clone()))?;

        let rating_calculation_duration = HistogramVec::new(
            HistogramOpts::new(
                "teamforge_rating_calculation_duration_seconds",
                "Time spent computing a rating update",
            )
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01]),
            &["scheme"],
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        Ok(Self {
            balance_duration,
            rating_calculation_duration,
        })
    }
}
