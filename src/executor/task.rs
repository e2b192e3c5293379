//! Task representation and execution.

use super::future::Completer;
use super::panic_handler::{PanicHandler, PanicInfo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Fire-and-forget work.
///
/// Implemented for every `FnOnce() + Send + 'static` closure, so most callers
/// never implement it by hand.
pub trait Runnable: Send + 'static {
    fn run(self: Box<Self>);
}

impl<F> Runnable for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// Work that produces a result.
pub trait Callable: Send + 'static {
    type Output: Send + 'static;

    fn call(self) -> Self::Output;
}

impl<F, R> Callable for F
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    type Output = R;

    fn call(self) -> R {
        self()
    }
}

/// Type-erased result-bearing work: runs the callable and writes its outcome
/// into the paired future.
pub(crate) trait ResultSlot: Send {
    fn complete(self: Box<Self>, guard: &PanicHandler) -> Option<PanicInfo>;
}

struct CallWithFuture<C: Callable> {
    task: C,
    completer: Completer<C::Output>,
}

impl<C: Callable> ResultSlot for CallWithFuture<C> {
    fn complete(self: Box<Self>, guard: &PanicHandler) -> Option<PanicInfo> {
        let CallWithFuture { task, completer } = *self;
        match guard.execute(move || task.call()) {
            Ok(value) => {
                completer.complete(Ok(value));
                None
            }
            Err(info) => {
                completer.complete(Err(info.clone().into()));
                Some(info)
            }
        }
    }
}

pub(crate) enum Payload {
    FireAndForget(Box<dyn Runnable>),
    WithResult(Box<dyn ResultSlot>),
}

/// Internal task representation
pub(crate) struct Job {
    pub(crate) id: TaskId,
    pub(crate) payload: Payload,
    pub(crate) submit_time: Instant,
}

impl Job {
    pub fn fire_and_forget<R: Runnable>(task: R) -> Self {
        Self::from_boxed(TaskId::next(), Box::new(task))
    }

    /// Keeps the id assigned when the task was first accepted.
    pub fn from_boxed(id: TaskId, task: Box<dyn Runnable>) -> Self {
        Job {
            id,
            payload: Payload::FireAndForget(task),
            submit_time: Instant::now(),
        }
    }

    pub fn with_result<C: Callable>(task: C, completer: Completer<C::Output>) -> Self {
        Job {
            id: TaskId::next(),
            payload: Payload::WithResult(Box::new(CallWithFuture { task, completer })),
            submit_time: Instant::now(),
        }
    }

    /// Runs the payload inside the recovery boundary. Returns the panic, if
    /// any, so the caller can report it.
    pub fn execute(self, guard: &PanicHandler) -> Option<PanicInfo> {
        match self.payload {
            Payload::FireAndForget(task) => guard.execute(move || task.run()).err(),
            Payload::WithResult(slot) => slot.complete(guard),
        }
    }

    pub fn has_result(&self) -> bool {
        matches!(self.payload, Payload::WithResult(_))
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("has_result", &self.has_result())
            .field("submit_time", &self.submit_time)
            .finish()
    }
}
