//! tickpool - worker pools with bounded admission and tick-driven scheduling
//!
//! A fixed-size [`ThreadPool`] fed through a bounded FIFO queue by a single
//! dispatcher thread, optional result-bearing submission through
//! [`FutureHandle`], and a [`ScheduledThreadPool`] that fires one-shot tasks
//! after a delay measured in ticks.
//!
//! # Quick Start
//!
//! ```no_run
//! use tickpool::prelude::*;
//! use std::time::Duration;
//!
//! let pool = ThreadPool::with_workers(4, 100).unwrap();
//!
//! pool.execute(|| println!("fire and forget")).unwrap();
//!
//! let answer = pool.execute_future(|| 40 + 2).unwrap();
//! assert_eq!(answer.get(), Ok(42));
//!
//! let scheduler = ScheduledThreadPool::with_workers(2).unwrap();
//! scheduler.schedule_once(|| println!("two ticks later"), Duration::from_secs(2));
//!
//! pool.close();
//! ```
//!
//! # Behaviour
//!
//! - **Backpressure**: submission never blocks; a saturated queue returns
//!   [`Error::QueueFull`]
//! - **Fault isolation**: a panicking task never takes its worker down; the
//!   panic reaches the future or the pool's error sink
//! - **Shutdown**: `close()` is idempotent and later submissions return
//!   [`Error::PoolClosed`]

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod scheduler;
pub mod telemetry;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{
    Callable, FutureHandle, PanicStrategy, Runnable, TaskFailure, TaskId, ThreadPool,
};
pub use scheduler::ScheduledThreadPool;
pub use telemetry::MetricsSnapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_pool_and_future_together() {
        let pool = ThreadPool::with_workers(2, 16).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let futures: Vec<_> = (0..10)
            .map(|i| {
                let log = log.clone();
                pool.execute_future(move || {
                    log.lock().push(i);
                    i * i
                })
                .unwrap()
            })
            .collect();

        let squares: Vec<i32> = futures.iter().map(|f| f.get().unwrap()).collect();
        assert_eq!(squares, (0..10).map(|i| i * i).collect::<Vec<_>>());
        assert_eq!(log.lock().len(), 10);

        pool.close();
    }
}
