//! Everything needed to submit and schedule work.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{Callable, FutureHandle, PanicStrategy, Runnable, ThreadPool};
pub use crate::scheduler::ScheduledThreadPool;
