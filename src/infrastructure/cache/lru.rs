//! Least-recently-used bookkeeping for the repository cache.

use std::collections::{BTreeMap, HashMap};

struct Slot<V> {
    value: V,
    touched: u64,
}

/// Outcome of an insert into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    /// The key already held a value which was replaced
    pub overridden: bool,
    /// Key evicted to make room for the new one
    pub evicted: Option<String>,
}

/// Bounded map evicting the least-recently-touched key
///
/// Recency is a monotonic tick: every read or write stamps the entry with
/// the next tick, and `recency` indexes entries by their stamp so the oldest
/// one is always the first key of the tree.
pub struct LruStore<V> {
    capacity: usize,
    entries: HashMap<String, Slot<V>>,
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl<V: Clone> LruStore<V> {
    /// Create a store holding at most `capacity` entries, 0 meaning unbounded
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity > 0
    }

    /// Read a value and mark it as most recently used
    pub fn get(&mut self, key: &str) -> Option<V> {
        let tick = self.next_tick();
        let slot = self.entries.get_mut(key)?;
        self.recency.remove(&slot.touched);
        slot.touched = tick;
        self.recency.insert(tick, key.to_string());
        Some(slot.value.clone())
    }

    /// Insert or replace a value, evicting the oldest entry when a new key
    /// would exceed the capacity
    pub fn put(&mut self, key: String, value: V) -> Inserted {
        let tick = self.next_tick();

        if let Some(slot) = self.entries.get_mut(&key) {
            self.recency.remove(&slot.touched);
            slot.value = value;
            slot.touched = tick;
            self.recency.insert(tick, key);
            return Inserted {
                overridden: true,
                evicted: None,
            };
        }

        let evicted = if self.is_bounded() && self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.recency.insert(tick, key.clone());
        self.entries.insert(
            key,
            Slot {
                value,
                touched: tick,
            },
        );

        Inserted {
            overridden: false,
            evicted,
        }
    }

    /// Keys ordered from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<&str> {
        self.recency.values().map(String::as_str).collect()
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
