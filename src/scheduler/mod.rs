//! Delayed, tick-driven task dispatch.
//!
//! A [`ScheduledThreadPool`] keeps a monotonically increasing tick counter
//! and a [`TickWheel`] of per-tick buckets. Every tick the due bucket is
//! evicted and its tasks are handed to the scheduler's own worker pool.

pub mod scheduled_pool;
pub mod wheel;

pub use scheduled_pool::ScheduledThreadPool;
pub use wheel::{delay_to_ticks, TickWheel};
