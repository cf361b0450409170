//! Metrics and monitoring for teamforge
//!
//! This module provides Prometheus metrics for balancing requests, rating
//! updates and their timings, exportable in the text exposition format.

pub mod collector;

pub use collector::{BalanceMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, RatingMetrics};
