use super::wheel::{delay_to_ticks, TickWheel};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::pool::QueueBound;
use crate::executor::task::{Runnable, TaskId};
use crate::executor::{ErrorSink, Job, TaskFailure, ThreadPool};
use crate::telemetry::MetricsSnapshot;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A task waiting in a tick bucket. Identity is its id, so two tasks never
/// collapse into one set entry.
pub(crate) struct ScheduledTask {
    id: TaskId,
    task: Box<dyn Runnable>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScheduledTask {}

impl Hash for ScheduledTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Runs one-shot tasks after a delay measured in whole ticks.
///
/// A background thread advances the tick counter once per
/// [`Config::tick_interval`] and forwards every task due at the new tick to
/// this scheduler's own worker pool.
pub struct ScheduledThreadPool {
    pool: Arc<ThreadPool>,
    wheel: Arc<TickWheel<ScheduledTask>>,
    tick_interval: Duration,
    shutdown: Mutex<Option<Sender<()>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ScheduledThreadPool {
    pub fn new(config: &Config) -> Result<Self> {
        Self::spawn(config, None)
    }

    /// Scheduler whose task panics are handed to `sink`.
    pub fn with_error_sink<F>(config: &Config, sink: F) -> Result<Self>
    where
        F: Fn(TaskFailure) + Send + Sync + 'static,
    {
        Self::spawn(config, Some(Arc::new(sink)))
    }

    fn spawn(config: &Config, sink: Option<ErrorSink>) -> Result<Self> {
        // the tick thread must never be refused, so this pool's queue is unbounded
        let pool = Arc::new(ThreadPool::spawn(config, QueueBound::Unbounded, sink)?);
        let wheel = Arc::new(TickWheel::new());
        let tick_interval = config.tick_interval;
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let ticker = thread::Builder::new()
            .name(format!("{}-ticker", config.thread_name_prefix))
            .spawn({
                let pool = pool.clone();
                let wheel = wheel.clone();
                move || {
                    let ticks = tick(tick_interval);
                    loop {
                        select! {
                            recv(ticks) -> _ => dispatch_due(&wheel, &pool),
                            recv(shutdown_rx) -> _ => break,
                        }
                    }
                    tracing::trace!("ticker exiting");
                }
            })
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

        tracing::debug!(
            workers = pool.num_workers(),
            tick_ms = tick_interval.as_millis() as u64,
            "scheduled pool started"
        );

        Ok(Self {
            pool,
            wheel,
            tick_interval,
            shutdown: Mutex::new(Some(shutdown_tx)),
            ticker: Mutex::new(Some(ticker)),
            closed: AtomicBool::new(false),
        })
    }

    /// One-second ticks, like a wall-clock timer.
    pub fn with_workers(num_workers: usize) -> Result<Self> {
        let config = Config::builder().num_workers(num_workers).build()?;
        Self::new(&config)
    }

    /// Runs `task` once, `delay` from now rounded down to whole ticks (at
    /// least one tick). Tasks scheduled after [`close`](Self::close) are
    /// dropped.
    pub fn schedule_once<R: Runnable>(&self, task: R, delay: Duration) {
        let id = TaskId::next();
        let delay_ticks = delay_to_ticks(delay, self.tick_interval);

        // the wheel refuses inserts under its own lock once closed
        let inserted = self.wheel.insert(
            delay_ticks,
            ScheduledTask {
                id,
                task: Box::new(task),
            },
        );

        match inserted {
            Some(target) => {
                self.pool.metrics_handle().record_scheduled();
                tracing::trace!(task_id = id.as_u64(), target, "task scheduled");
            }
            None => tracing::warn!(task_id = id.as_u64(), "scheduler closed, task dropped"),
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.wheel.current()
    }

    /// Scheduled tasks whose tick has not arrived yet.
    pub fn pending(&self) -> usize {
        self.wheel.pending()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pool.metrics()
    }

    /// Closes the wheel, stops the tick thread, then closes the worker pool.
    /// Tasks whose tick has not arrived are dropped. Calling it again is a
    /// no-op.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let dropped = self.wheel.close();

        drop(self.shutdown.lock().take());
        if let Some(ticker) = self.ticker.lock().take() {
            if ticker.thread().id() != thread::current().id() {
                let _ = ticker.join();
            }
        }

        self.pool.close();

        tracing::debug!(dropped, "scheduled pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn dispatch_due(wheel: &TickWheel<ScheduledTask>, pool: &ThreadPool) {
    let (tick, due) = wheel.advance();
    if due.is_empty() {
        return;
    }

    tracing::debug!(tick, count = due.len(), "dispatching scheduled tasks");

    for ScheduledTask { id, task } in due {
        if let Err(err) = pool.submit(Job::from_boxed(id, task)) {
            tracing::warn!(task_id = id.as_u64(), tick, error = %err, "scheduled task dropped");
        }
    }
}

impl fmt::Debug for ScheduledThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledThreadPool")
            .field("current_tick", &self.current_tick())
            .field("pending", &self.pending())
            .field("tick_interval", &self.tick_interval)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for ScheduledThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn scheduler(tick_ms: u64) -> ScheduledThreadPool {
        let config = Config::builder()
            .num_workers(4)
            .tick_interval(Duration::from_millis(tick_ms))
            .build()
            .unwrap();
        ScheduledThreadPool::new(&config).unwrap()
    }

    #[test]
    fn test_scheduled_task_identity() {
        let a = ScheduledTask {
            id: TaskId::next(),
            task: Box::new(|| {}),
        };
        let b = ScheduledTask {
            id: TaskId::next(),
            task: Box::new(|| {}),
        };

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(set.insert(b));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_schedule_once_runs_task() {
        let sched = scheduler(10);
        let (done_tx, done_rx) = bounded(1);

        sched.schedule_once(move || done_tx.send(()).unwrap(), Duration::from_millis(20));

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(sched.metrics().tasks_scheduled, 1);
    }

    #[test]
    fn test_schedule_after_close_is_dropped() {
        let sched = scheduler(10);
        sched.close();
        sched.close();

        let (done_tx, done_rx) = bounded::<()>(1);
        sched.schedule_once(move || done_tx.send(()).unwrap(), Duration::ZERO);

        assert_eq!(sched.pending(), 0);
        // the task was dropped, so its sender is gone
        assert!(done_rx.recv().is_err());
    }

    #[test]
    fn test_scheduler_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScheduledThreadPool>();
        assert_send_sync::<Arc<TickWheel<ScheduledTask>>>();
    }

    #[test]
    fn test_error_sink_receives_scheduled_panic() {
        let (fail_tx, fail_rx) = bounded(1);
        let config = Config::builder()
            .num_workers(1)
            .tick_interval(Duration::from_millis(10))
            .panic_strategy(crate::executor::PanicStrategy::Isolate)
            .build()
            .unwrap();
        let sched = ScheduledThreadPool::with_error_sink(&config, move |failure: TaskFailure| {
            let _ = fail_tx.send(failure.panic.message);
        })
        .unwrap();

        sched.schedule_once(|| panic!("report overdue"), Duration::from_millis(10));

        assert_eq!(
            fail_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "report overdue"
        );
        sched.close();
    }

    #[test]
    fn test_close_drops_future_ticks() {
        let sched = scheduler(1000);
        let (done_tx, done_rx) = bounded::<()>(1);
        sched.schedule_once(move || done_tx.send(()).unwrap(), Duration::from_secs(60));
        assert_eq!(sched.pending(), 1);

        sched.close();
        assert_eq!(sched.pending(), 0);
        assert!(done_rx.recv().is_err());
    }
}
