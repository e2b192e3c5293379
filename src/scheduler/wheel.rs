//! Tick counter plus the per-tick buckets of due items.

use crate::util::ConcurrentSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Whole ticks in `delay`, rounded down.
pub fn delay_to_ticks(delay: Duration, tick_interval: Duration) -> u64 {
    let tick_ns = tick_interval.as_nanos().max(1);
    (delay.as_nanos() / tick_ns).min(u64::MAX as u128) as u64
}

struct WheelState<T> {
    counter: u64,
    closed: bool,
    buckets: HashMap<u64, Arc<ConcurrentSet<T>>>,
}

/// Maps tick numbers to the set of items due at that tick.
///
/// The counter increment, bucket creation and bucket eviction all happen
/// under one lock, and items are added to a bucket while that lock is held,
/// so an item can never land in a bucket that has already been evicted.
pub struct TickWheel<T> {
    state: Mutex<WheelState<T>>,
}

impl<T: Eq + Hash> TickWheel<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WheelState {
                counter: 0,
                closed: false,
                buckets: HashMap::new(),
            }),
        }
    }

    pub fn current(&self) -> u64 {
        self.state.lock().counter
    }

    /// Files `item` under `current + delay_ticks` and returns that tick, or
    /// `None` (dropping the item) once the wheel is closed.
    ///
    /// A delay of zero ticks targets the next tick: the current tick's
    /// bucket has already been dispatched.
    pub fn insert(&self, delay_ticks: u64, item: T) -> Option<u64> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let target = state.counter.saturating_add(delay_ticks.max(1));

        let bucket = state
            .buckets
            .entry(target)
            .or_insert_with(|| Arc::new(ConcurrentSet::new()))
            .clone();
        bucket.add(item);

        Some(target)
    }

    /// Advances the counter by one and evicts the bucket for the new tick,
    /// returning the tick and its items (in no particular order).
    pub fn advance(&self) -> (u64, Vec<T>) {
        let bucket = {
            let mut state = self.state.lock();
            state.counter += 1;
            let tick = state.counter;
            (tick, state.buckets.remove(&tick))
        };

        match bucket {
            (tick, Some(items)) => (tick, items.drain()),
            (tick, None) => (tick, Vec::new()),
        }
    }

    /// Items registered for `tick` and not yet dispatched.
    pub fn bucket_len(&self, tick: u64) -> usize {
        self.state
            .lock()
            .buckets
            .get(&tick)
            .map_or(0, |bucket| bucket.len())
    }

    /// Items waiting across all future ticks.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .buckets
            .values()
            .map(|bucket| bucket.len())
            .sum()
    }

    pub fn bucket_count(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Refuses further inserts and drops every pending item; returns how
    /// many there were.
    pub fn close(&self) -> usize {
        let buckets: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.buckets.drain().collect()
        };
        buckets.into_iter().map(|(_, bucket)| bucket.drain().len()).sum()
    }
}

impl<T> std::fmt::Debug for TickWheel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TickWheel")
            .field("counter", &state.counter)
            .field("closed", &state.closed)
            .field("buckets", &state.buckets.len())
            .finish()
    }
}

impl<T: Eq + Hash> Default for TickWheel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_delay_to_ticks_rounds_down() {
        let tick = Duration::from_millis(100);
        assert_eq!(delay_to_ticks(Duration::ZERO, tick), 0);
        assert_eq!(delay_to_ticks(Duration::from_millis(99), tick), 0);
        assert_eq!(delay_to_ticks(Duration::from_millis(200), tick), 2);
        assert_eq!(delay_to_ticks(Duration::from_millis(250), tick), 2);
        assert_eq!(delay_to_ticks(Duration::from_secs(3), Duration::from_secs(1)), 3);
    }

    #[test]
    fn test_item_due_after_delay() {
        let wheel = TickWheel::new();
        assert_eq!(wheel.insert(2, "job"), Some(2));

        assert_eq!(wheel.advance(), (1, vec![]));
        assert_eq!(wheel.advance(), (2, vec!["job"]));
        assert_eq!(wheel.advance(), (3, vec![]));
    }

    #[test]
    fn test_zero_delay_targets_next_tick() {
        let wheel = TickWheel::new();
        wheel.advance();
        assert_eq!(wheel.insert(0, 1), Some(2));
        assert_eq!(wheel.advance(), (2, vec![1]));
    }

    #[test]
    fn test_same_tick_items_share_bucket() {
        let wheel = TickWheel::new();
        wheel.insert(1, "a");
        wheel.insert(1, "b");
        assert_eq!(wheel.bucket_len(1), 2);
        assert_eq!(wheel.bucket_count(), 1);

        let (tick, mut items) = wheel.advance();
        items.sort();
        assert_eq!(tick, 1);
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn test_bucket_evicted_on_dispatch() {
        let wheel = TickWheel::new();
        for delay in 1..=5 {
            wheel.insert(delay, delay);
        }
        assert_eq!(wheel.bucket_count(), 5);
        assert_eq!(wheel.pending(), 5);

        for _ in 0..5 {
            wheel.advance();
        }
        assert_eq!(wheel.bucket_count(), 0);
        assert_eq!(wheel.pending(), 0);
    }

    #[test]
    fn test_concurrent_inserts_same_tick_are_all_kept() {
        let wheel = Arc::new(TickWheel::new());
        let barrier = Arc::new(std::sync::Barrier::new(10));

        let handles: Vec<_> = (0..10)
            .map(|t| {
                let wheel = wheel.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..100 {
                        assert_eq!(wheel.insert(3, t * 100 + i), Some(3));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wheel.bucket_len(3), 1000);

        wheel.advance();
        wheel.advance();
        let (tick, items) = wheel.advance();
        assert_eq!(tick, 3);
        assert_eq!(items.len(), 1000);
    }

    #[test]
    fn test_close_drops_pending() {
        let wheel = TickWheel::new();
        wheel.insert(1, 'x');
        wheel.insert(4, 'y');
        assert_eq!(wheel.close(), 2);
        assert_eq!(wheel.pending(), 0);
    }

    #[test]
    fn test_insert_after_close_is_refused() {
        let wheel = TickWheel::new();
        wheel.close();
        assert_eq!(wheel.insert(1, 'z'), None);
        assert_eq!(wheel.pending(), 0);
        assert_eq!(wheel.bucket_count(), 0);
    }

    #[test]
    fn test_inserts_racing_close_never_linger() {
        let wheel = Arc::new(TickWheel::new());
        let barrier = Arc::new(std::sync::Barrier::new(5));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let wheel = wheel.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..500 {
                        wheel.insert(2, t * 1000 + i);
                    }
                })
            })
            .collect();

        barrier.wait();
        wheel.close();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wheel.pending(), 0);
    }
}
