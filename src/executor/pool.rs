use super::future::FutureHandle;
use super::panic_handler::{ErrorSink, PanicHandler, PanicStrategy, TaskFailure};
use super::task::{Callable, Job, Runnable};
use super::worker::{Inbox, Worker};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueBound {
    Bounded(usize),
    Unbounded,
}

/// Fixed set of workers fed from a bounded FIFO queue by a dispatcher thread.
///
/// Submission never blocks: a full queue is reported as [`Error::QueueFull`].
/// Dispatch order is submission order; completion order is not.
pub struct ThreadPool {
    queue_tx: Sender<Job>,
    queue_rx: Receiver<Job>,
    shutdown: Mutex<Option<Sender<()>>>,
    closed: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    num_workers: usize,
    bound: QueueBound,
    guard: Arc<PanicHandler>,
    metrics: Arc<Metrics>,
}

impl ThreadPool {
    pub fn new(config: &Config) -> Result<Self> {
        Self::spawn(config, QueueBound::Bounded(config.queue_size), None)
    }

    /// Pool whose fire-and-forget task panics are handed to `sink`.
    pub fn with_error_sink<F>(config: &Config, sink: F) -> Result<Self>
    where
        F: Fn(TaskFailure) + Send + Sync + 'static,
    {
        Self::spawn(
            config,
            QueueBound::Bounded(config.queue_size),
            Some(Arc::new(sink)),
        )
    }

    pub fn with_workers(num_workers: usize, queue_size: usize) -> Result<Self> {
        let config = Config::builder()
            .num_workers(num_workers)
            .queue_size(queue_size)
            .build()?;
        Self::new(&config)
    }

    pub(crate) fn spawn(
        config: &Config,
        bound: QueueBound,
        sink: Option<ErrorSink>,
    ) -> Result<Self> {
        config.validate()?;

        let num_workers = config.worker_threads();

        let (queue_tx, queue_rx) = match bound {
            QueueBound::Bounded(size) => bounded(size),
            QueueBound::Unbounded => unbounded(),
        };
        let (idle_tx, idle_rx) = bounded::<Inbox>(num_workers);
        // never sent on; dropping the sender is the broadcast
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let closed = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(Metrics::new());

        let mut guard = PanicHandler::new(config.panic_strategy);
        if let Some(sink) = sink {
            guard = guard.with_sink(sink);
        }
        let guard = Arc::new(guard);

        let mut threads = Vec::with_capacity(num_workers + 1);

        for id in 0..num_workers {
            let worker = Worker::new(
                id,
                idle_tx.clone(),
                shutdown_rx.clone(),
                closed.clone(),
                guard.clone(),
                metrics.clone(),
            );

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let handle = builder
                .spawn(move || worker.run())
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;
            threads.push(handle);
        }
        drop(idle_tx);

        let dispatcher = thread::Builder::new()
            .name(format!("{}-dispatch", config.thread_name_prefix))
            .spawn({
                let queue_rx = queue_rx.clone();
                let shutdown_rx = shutdown_rx.clone();
                let metrics = metrics.clone();
                move || dispatch(queue_rx, idle_rx, shutdown_rx, metrics)
            })
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;
        threads.push(dispatcher);

        tracing::debug!(
            workers = num_workers,
            queue_size = ?bound,
            prefix = %config.thread_name_prefix,
            "thread pool started"
        );

        Ok(Self {
            queue_tx,
            queue_rx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            closed,
            threads: Mutex::new(threads),
            num_workers,
            bound,
            guard,
            metrics,
        })
    }

    /// Queues fire-and-forget work.
    pub fn execute<R: Runnable>(&self, task: R) -> Result<()> {
        self.submit(Job::fire_and_forget(task))
    }

    /// Queues work whose result is delivered through the returned handle.
    /// On `QueueFull` no handle is produced.
    pub fn execute_future<C: Callable>(&self, task: C) -> Result<FutureHandle<C::Output>> {
        let (handle, completer) = FutureHandle::pair();
        self.submit(Job::with_result(task, completer))?;
        Ok(handle)
    }

    pub(crate) fn submit(&self, job: Job) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        match self.queue_tx.try_send(job) {
            Ok(()) => {
                self.metrics.record_submitted();
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                self.metrics.record_rejected();
                tracing::trace!(task_id = job.id.as_u64(), "queue full, task rejected");
                Err(Error::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::PoolClosed),
        }
    }

    /// Signals shutdown and waits for the dispatcher and every worker to
    /// exit. Running tasks finish; queued tasks are discarded and their
    /// futures resolve to `PoolClosed`. Calling it again is a no-op.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        drop(self.shutdown.lock().take());

        let current = thread::current().id();
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            // a task closing its own pool cannot wait for itself
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }

        let mut discarded = 0;
        while self.queue_rx.try_recv().is_ok() {
            self.metrics.record_discarded();
            discarded += 1;
        }

        tracing::debug!(discarded, "thread pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Tasks accepted but not yet handed to a worker.
    pub fn queued(&self) -> usize {
        self.queue_rx.len()
    }

    /// `None` for the unbounded queue behind a scheduler.
    pub fn queue_capacity(&self) -> Option<usize> {
        match self.bound {
            QueueBound::Bounded(size) => Some(size),
            QueueBound::Unbounded => None,
        }
    }

    pub fn panic_count(&self) -> usize {
        self.guard.panic_count()
    }

    pub fn panic_strategy(&self) -> PanicStrategy {
        self.guard.strategy()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn metrics_handle(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_workers", &self.num_workers)
            .field("bound", &self.bound)
            .field("queued", &self.queued())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reserves an idle worker, then hands it the oldest queued job.
fn dispatch(
    queue: Receiver<Job>,
    idle: Receiver<Inbox>,
    shutdown: Receiver<()>,
    metrics: Arc<Metrics>,
) {
    loop {
        let inbox = select! {
            recv(idle) -> inbox => match inbox {
                Ok(inbox) => inbox,
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        };

        let job = select! {
            recv(queue) -> job => match job {
                Ok(job) => job,
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        };

        match inbox.send(job) {
            Ok(()) => metrics.record_dispatched(),
            // worker already gone, which only happens during shutdown
            Err(_) => {
                metrics.record_discarded();
                break;
            }
        }
    }

    tracing::trace!("dispatcher exiting");
}
