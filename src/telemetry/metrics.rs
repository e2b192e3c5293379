//! Metrics collection for pool monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "telemetry")]
use hdrhistogram::Histogram;
#[cfg(feature = "telemetry")]
use parking_lot::Mutex;

/// Pool metrics collector
#[derive(Debug)]
pub struct Metrics {
    // Admission counters
    tasks_submitted: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_scheduled: AtomicU64,

    // Execution counters
    tasks_dispatched: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_panicked: AtomicU64,
    tasks_discarded: AtomicU64,

    // max value of 1 hour in nanoseconds, 3 significant figures
    #[cfg(feature = "telemetry")]
    latency_histogram: Mutex<Option<Histogram<u64>>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_scheduled: AtomicU64::new(0),
            tasks_dispatched: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_discarded: AtomicU64::new(0),
            #[cfg(feature = "telemetry")]
            latency_histogram: Mutex::new(Histogram::new_with_max(3_600_000_000_000, 3).ok()),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduled(&self) {
        self.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.tasks_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished task (panicked or not) with its run time
    pub fn record_task_execution(&self, duration_ns: u64) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "telemetry")]
        if let Some(mut guard) = self.latency_histogram.try_lock() {
            if let Some(hist) = guard.as_mut() {
                let _ = hist.record(duration_ns.max(1));
            }
        }

        #[cfg(not(feature = "telemetry"))]
        let _ = duration_ns;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        #[allow(unused_mut)]
        let mut snapshot = MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_scheduled: self.tasks_scheduled.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_discarded: self.tasks_discarded.load(Ordering::Relaxed),
            avg_latency_ns: 0,
            p50_latency_ns: 0,
            p99_latency_ns: 0,
            max_latency_ns: 0,
        };

        #[cfg(feature = "telemetry")]
        if let Some(hist) = self.latency_histogram.lock().as_ref() {
            if hist.len() > 0 {
                snapshot.avg_latency_ns = hist.mean() as u64;
                snapshot.p50_latency_ns = hist.value_at_quantile(0.50);
                snapshot.p99_latency_ns = hist.value_at_quantile(0.99);
                snapshot.max_latency_ns = hist.max();
            }
        }

        snapshot
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub tasks_submitted: u64,
    pub tasks_rejected: u64,
    pub tasks_scheduled: u64,
    pub tasks_dispatched: u64,
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    /// Accepted but dropped by shutdown before running.
    pub tasks_discarded: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Fraction of admission attempts rejected with `QueueFull`
    pub fn rejection_rate(&self) -> f64 {
        let attempts = self.tasks_submitted + self.tasks_rejected;
        if attempts == 0 {
            return 0.0;
        }
        self.tasks_rejected as f64 / attempts as f64
    }

    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_executed as f64 / seconds
    }
}
