// worker thread stuff
use super::panic_handler::{PanicHandler, TaskFailure};
use super::task::Job;
use crate::telemetry::Metrics;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

/// Single-task inbox a worker advertises while idle.
pub(crate) type Inbox = Sender<Job>;

pub(crate) struct Worker {
    pub id: WorkerId,
    inbox_tx: Inbox,
    inbox_rx: Receiver<Job>,
    idle: Sender<Inbox>,
    shutdown: Receiver<()>,
    closed: Arc<AtomicBool>,
    guard: Arc<PanicHandler>,
    metrics: Arc<Metrics>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        idle: Sender<Inbox>,
        shutdown: Receiver<()>,
        closed: Arc<AtomicBool>,
        guard: Arc<PanicHandler>,
        metrics: Arc<Metrics>,
    ) -> Self {
        // one slot so a hand-off never blocks the dispatcher
        let (inbox_tx, inbox_rx) = bounded(1);
        Self {
            id,
            inbox_tx,
            inbox_rx,
            idle,
            shutdown,
            closed,
            guard,
            metrics,
        }
    }

    // main loop
    pub fn run(self) {
        loop {
            // advertise idleness; the registry only disconnects with the pool
            if self.idle.send(self.inbox_tx.clone()).is_err() {
                break;
            }

            select! {
                recv(self.inbox_rx) -> job => match job {
                    Ok(job) => {
                        if self.closed.load(Ordering::Acquire) {
                            self.metrics.record_discarded();
                            break;
                        }
                        self.execute_job(job);
                    }
                    Err(_) => break,
                },
                recv(self.shutdown) -> _ => break,
            }
        }

        tracing::trace!(worker = self.id, "worker exiting");
    }

    fn execute_job(&self, job: Job) {
        let task_id = job.id;
        let start = Instant::now();

        let failure = job.execute(&self.guard);

        self.metrics
            .record_task_execution(start.elapsed().as_nanos() as u64);

        if let Some(panic) = failure {
            self.metrics.record_task_panic();
            self.guard.report(TaskFailure {
                task_id,
                worker: self.id,
                panic,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::future::FutureHandle;
    use crate::executor::PanicStrategy;
    use std::thread;

    struct Harness {
        idle_rx: Receiver<Inbox>,
        shutdown_tx: Option<Sender<()>>,
        closed: Arc<AtomicBool>,
        metrics: Arc<Metrics>,
        handle: thread::JoinHandle<()>,
    }

    fn start_worker() -> Harness {
        let (idle_tx, idle_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let closed = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(Metrics::new());
        let worker = Worker::new(
            0,
            idle_tx,
            shutdown_rx,
            closed.clone(),
            Arc::new(PanicHandler::new(PanicStrategy::Isolate)),
            metrics.clone(),
        );
        let handle = thread::spawn(move || worker.run());

        Harness {
            idle_rx,
            shutdown_tx: Some(shutdown_tx),
            closed,
            metrics,
            handle,
        }
    }

    #[test]
    fn test_worker_reregisters_after_each_job() {
        let harness = start_worker();
        let (done_tx, done_rx) = bounded(2);

        for i in 0..2 {
            let inbox = harness.idle_rx.recv().unwrap();
            let done_tx = done_tx.clone();
            inbox.send(Job::fire_and_forget(move || done_tx.send(i).unwrap())).unwrap();
            assert_eq!(done_rx.recv().unwrap(), i);
        }

        // idle again after the second job
        let _inbox = harness.idle_rx.recv().unwrap();

        drop(harness.shutdown_tx);
        harness.handle.join().unwrap();
        assert_eq!(harness.metrics.snapshot().tasks_executed, 2);
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let harness = start_worker();

        let inbox = harness.idle_rx.recv().unwrap();
        inbox.send(Job::fire_and_forget(|| panic!("boom"))).unwrap();

        let (handle, completer) = FutureHandle::pair();
        let inbox = harness.idle_rx.recv().unwrap();
        inbox.send(Job::with_result(|| 5, completer)).unwrap();
        assert_eq!(handle.get(), Ok(5));

        drop(harness.shutdown_tx);
        harness.handle.join().unwrap();

        let snapshot = harness.metrics.snapshot();
        assert_eq!(snapshot.tasks_executed, 2);
        assert_eq!(snapshot.tasks_panicked, 1);
    }

    #[test]
    fn test_worker_discards_job_after_close() {
        let harness = start_worker();
        let inbox = harness.idle_rx.recv().unwrap();

        harness.closed.store(true, Ordering::Release);
        let (handle, completer) = FutureHandle::<i32>::pair();
        inbox.send(Job::with_result(|| 1, completer)).unwrap();

        harness.handle.join().unwrap();
        assert_eq!(handle.get(), Err(crate::Error::PoolClosed));
        assert_eq!(harness.metrics.snapshot().tasks_executed, 0);
        drop(harness.shutdown_tx);
    }
}
