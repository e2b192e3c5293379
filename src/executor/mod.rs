//! Task execution infrastructure.
//!
//! This module provides the core task execution primitives: the two task
//! capabilities, result futures, worker threads and the dispatching
//! thread pool.

pub mod future;
pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use future::FutureHandle;
pub use panic_handler::{ErrorSink, PanicHandler, PanicInfo, PanicStrategy, TaskFailure};
pub use pool::ThreadPool;
pub use task::{Callable, Runnable, TaskId};
pub use worker::WorkerId;

pub(crate) use task::Job;
