use super::task::TaskId;
use crate::error::Error;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    Abort,
    /// Swallow the panic; only the error sink hears about it.
    Isolate,
    #[default]
    LogAndContinue,
}

/// A fire-and-forget task that panicked.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub worker: usize,
    pub panic: PanicInfo,
}

/// Pool-level receiver for failures of tasks that have no future to carry them.
pub type ErrorSink = Arc<dyn Fn(TaskFailure) + Send + Sync>;

pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
    sink: Option<ErrorSink>,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(panic_payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let panic_info = PanicInfo::from_payload(panic_payload);

                if self.strategy == PanicStrategy::Abort {
                    tracing::error!(message = %panic_info.message, "task panicked, aborting");
                    std::process::abort();
                }

                Err(panic_info)
            }
        }
    }

    /// Routes a fire-and-forget failure to the sink, logging it first under
    /// `LogAndContinue`.
    pub fn report(&self, failure: TaskFailure) {
        if self.strategy == PanicStrategy::LogAndContinue {
            tracing::error!(
                task_id = failure.task_id.as_u64(),
                worker = failure.worker,
                message = %failure.panic.message,
                "task panicked"
            );
        }

        if let Some(sink) = &self.sink {
            // a panicking sink must not take the worker down with it
            if catch_unwind(AssertUnwindSafe(|| sink(failure))).is_err() {
                tracing::warn!("error sink panicked");
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

impl fmt::Debug for PanicHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicHandler")
            .field("strategy", &self.strategy)
            .field("panic_count", &self.panic_count())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

impl From<PanicInfo> for Error {
    fn from(info: PanicInfo) -> Self {
        Error::TaskPanicked(info.message)
    }
}
