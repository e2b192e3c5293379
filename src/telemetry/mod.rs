//! Pool observability.
//!
//! Counters are always collected. The `telemetry` feature adds a latency
//! histogram to each [`Metrics`] instance.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
