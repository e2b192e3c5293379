//! Write-once, multi-waiter completion cell for result-bearing tasks.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

struct Inner<T> {
    slot: Mutex<Option<Result<T>>>,
    ready: Condvar,
}

impl<T> Inner<T> {
    /// Returns false if the slot was already written.
    fn fill(&self, outcome: Result<T>) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        drop(slot);
        self.ready.notify_all();
        true
    }
}

/// Handle to the eventual result of a task submitted with
/// [`ThreadPool::execute_future`](crate::ThreadPool::execute_future).
///
/// Clones share the same cell. Any number of threads may call [`get`](Self::get),
/// before or after completion, and all observe the same outcome.
pub struct FutureHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> FutureHandle<T> {
    pub(crate) fn pair() -> (FutureHandle<T>, Completer<T>) {
        let inner = Arc::new(Inner {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        });
        (
            FutureHandle {
                inner: inner.clone(),
            },
            Completer { inner: Some(inner) },
        )
    }

    pub fn is_done(&self) -> bool {
        self.inner.slot.lock().is_some()
    }
}

impl<T: Clone> FutureHandle<T> {
    /// Blocks until the task finished, then returns its result.
    ///
    /// Returns `Err(TaskPanicked)` if the task panicked and `Err(PoolClosed)`
    /// if the pool discarded it during shutdown.
    pub fn get(&self) -> Result<T> {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.inner.ready.wait(&mut slot);
        }
    }

    /// Non-blocking variant of [`get`](Self::get).
    pub fn try_get(&self) -> Option<Result<T>> {
        self.inner.slot.lock().clone()
    }
}

impl<T> Clone for FutureHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for FutureHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

/// Producer side. Completes at most once; if dropped unfinished the future
/// resolves to `PoolClosed` so waiters never hang on a discarded task.
pub(crate) struct Completer<T> {
    inner: Option<Arc<Inner<T>>>,
}

impl<T> Completer<T> {
    pub fn complete(mut self, outcome: Result<T>) {
        if let Some(inner) = self.inner.take() {
            inner.fill(outcome);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.fill(Err(Error::PoolClosed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_complete_then_get() {
        let (handle, completer) = FutureHandle::pair();
        assert!(!handle.is_done());
        assert_eq!(handle.try_get(), None);

        completer.complete(Ok(42));

        assert!(handle.is_done());
        assert_eq!(handle.get(), Ok(42));
        // repeatable read
        assert_eq!(handle.get(), Ok(42));
        assert_eq!(handle.try_get(), Some(Ok(42)));
    }

    #[test]
    fn test_multiple_waiters() {
        let (handle, completer) = FutureHandle::pair();
        let barrier = Arc::new(std::sync::Barrier::new(9));

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    handle.get()
                })
            })
            .collect();

        barrier.wait();
        completer.complete(Ok(String::from("done")));

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok(String::from("done")));
        }

        // late arrival sees the same value
        assert_eq!(handle.get(), Ok(String::from("done")));
    }

    #[test]
    fn test_dropped_completer_resolves_closed() {
        let (handle, completer) = FutureHandle::<i32>::pair();
        drop(completer);
        assert_eq!(handle.get(), Err(Error::PoolClosed));
    }

    #[test]
    fn test_slot_written_once() {
        let (_handle, completer) = FutureHandle::pair();
        let inner = completer.inner.clone().unwrap();
        completer.complete(Ok(1));
        assert!(!inner.fill(Ok(2)));
        assert_eq!(*inner.slot.lock(), Some(Ok(1)));
    }
}
