//! Thread-safe unordered set.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;

/// A `HashSet` behind a mutex. Every operation takes the lock for its own
/// duration only, so the set can be shared through an `Arc` without outside
/// synchronisation. Members only need to be `Send` for the set to be `Sync`.
#[derive(Debug)]
pub struct ConcurrentSet<T> {
    items: Mutex<HashSet<T>>,
}

impl<T: Eq + Hash> ConcurrentSet<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashSet::new()),
        }
    }

    /// Returns false if an equal value was already present; the existing
    /// value is kept.
    pub fn add(&self, value: T) -> bool {
        self.items.lock().insert(value)
    }

    pub fn remove(&self, value: &T) -> bool {
        self.items.lock().remove(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.items.lock().contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Removes and returns every member, in no particular order.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain().collect()
    }
}

impl<T: Eq + Hash + Clone> ConcurrentSet<T> {
    /// Copy of the current members, in no particular order.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }
}

impl<T: Eq + Hash> Default for ConcurrentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
