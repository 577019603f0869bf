//! Duration aggregation table

use dashmap::DashMap;

use crate::domain::{CountKey, Micros};

/// Cumulative off-CPU microseconds per (thread name, stack)
#[derive(Default)]
pub struct CountTable {
    totals: DashMap<CountKey, u64>,
}

impl CountTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the entry for `key`, creating it at zero first
    ///
    /// Saturates at `u64::MAX` instead of wrapping.
    pub fn add(&self, key: CountKey, delta: Micros) {
        let mut total = self.totals.entry(key).or_insert(0);
        *total = total.saturating_add(delta.0);
    }

    /// Current total for `key`, without clearing it
    pub fn get(&self, key: &CountKey) -> Option<Micros> {
        self.totals.get(key).map(|total| Micros(*total))
    }

    /// Take every entry and leave the table empty for the next window
    ///
    /// Shards are emptied one at a time under their own lock, so a concurrent
    /// add lands either in this drain or in the next one.
    pub fn drain(&self) -> Vec<(CountKey, Micros)> {
        let mut drained = Vec::with_capacity(self.totals.len());
        self.totals.retain(|key, total| {
            drained.push((*key, Micros(*total)));
            false
        });
        drained
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StackId, ThreadName};
    use std::sync::Arc;
    use std::thread;

    fn key(name: &str, stack: i64) -> CountKey {
        CountKey { name: ThreadName::new(name), stack: StackId(stack) }
    }

    #[test]
    fn test_add_accumulates_per_key() {
        let counts = CountTable::new();
        counts.add(key("worker", 0), Micros(100));
        counts.add(key("worker", 0), Micros(50));
        counts.add(key("worker", 1), Micros(7));
        assert_eq!(counts.get(&key("worker", 0)), Some(Micros(150)));
        assert_eq!(counts.get(&key("worker", 1)), Some(Micros(7)));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_add_saturates() {
        let counts = CountTable::new();
        counts.add(key("t", 0), Micros(u64::MAX - 1));
        counts.add(key("t", 0), Micros(10));
        assert_eq!(counts.get(&key("t", 0)), Some(Micros(u64::MAX)));
    }

    #[test]
    fn test_second_drain_is_empty() {
        let counts = CountTable::new();
        counts.add(key("a", 0), Micros(1));
        counts.add(key("b", StackId::UNKNOWN.0), Micros(2));
        let mut drained = counts.drain();
        drained.sort();
        assert_eq!(drained, vec![(key("a", 0), Micros(1)), (key("b", -1), Micros(2))]);
        assert!(counts.drain().is_empty());
        assert!(counts.is_empty());
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let counts = Arc::new(CountTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counts = Arc::clone(&counts);
                thread::spawn(move || {
                    for i in 0..1000i64 {
                        counts.add(key("pool", i % 10), Micros(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let total: u64 = counts.drain().into_iter().map(|(_, v)| v.0).sum();
        assert_eq!(total, 8000);
    }
}
