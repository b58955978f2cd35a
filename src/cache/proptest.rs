//! Property-Based Tests for the Bounded LRU
//!
//! Drives [`BoundedLru`] with random operation sequences and checks it
//! against a plain `Vec` kept in recency order.
//!
//! # Test Properties
//!
//! 1. **Bounded**: `len() <= capacity` after every operation
//! 2. **Eviction Order**: the evicted entry is always the least recently touched
//! 3. **Read-after-write**: a key just put is readable with its latest value
//! 4. **Structure**: list links and index agree after every operation

#![cfg(test)]

use proptest::prelude::*;

use super::lru::BoundedLru;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u32),
    Get(u8),
    Remove(u8),
}

/// Keys drawn from a small space so hits and overwrites are common.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..12, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        3 => (0u8..12).prop_map(Op::Get),
        1 => (0u8..12).prop_map(Op::Remove),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 0..200)
}

/// Reference model: most recently used first.
#[derive(Default)]
struct Model {
    entries: Vec<(u8, u32)>,
}

impl Model {
    fn touch(&mut self, key: u8) -> Option<u32> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        let entry = self.entries.remove(pos);
        self.entries.insert(0, entry);
        Some(entry.1)
    }

    fn put(&mut self, key: u8, value: u32, capacity: usize) -> Option<(u8, u32)> {
        if self.touch(key).is_some() {
            self.entries[0].1 = value;
            return None;
        }
        self.entries.insert(0, (key, value));
        if self.entries.len() > capacity {
            return self.entries.pop();
        }
        None
    }

    fn remove(&mut self, key: u8) -> Option<u32> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }
}

// =============================================================================
// Model Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: every operation agrees with the reference model.
    #[test]
    fn prop_matches_reference_model(
        capacity in 0usize..8,
        ops in ops_strategy(),
    ) {
        let mut lru = BoundedLru::new(capacity);
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let evicted = lru.put(k, v);
                    prop_assert_eq!(evicted, model.put(k, v, capacity));
                }
                Op::Get(k) => {
                    prop_assert_eq!(lru.get(&k).copied(), model.touch(k));
                }
                Op::Remove(k) => {
                    prop_assert_eq!(lru.remove(&k), model.remove(k));
                }
            }

            prop_assert!(lru.len() <= capacity);
            prop_assert_eq!(lru.len(), model.entries.len());
            lru.assert_invariants();
        }

        let order: Vec<(u8, u32)> = lru.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(order, model.entries);
    }

    /// Property: a key just put is readable with its latest value.
    #[test]
    fn prop_read_after_write(
        capacity in 1usize..8,
        ops in ops_strategy(),
        key in 0u8..12,
        value in any::<u32>(),
    ) {
        let mut lru = BoundedLru::new(capacity);
        for op in ops {
            if let Op::Put(k, v) = op {
                lru.put(k, v);
            }
        }

        lru.put(key, value);
        prop_assert_eq!(lru.peek(&key), Some(&value));
        let keys_mru = lru.keys_mru();
        prop_assert_eq!(keys_mru.first(), Some(&key));
    }
}

// =============================================================================
// Eviction Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: inserting distinct keys into a full cache evicts in insertion order.
    #[test]
    fn prop_fifo_without_reads(
        capacity in 1usize..16,
        extra in 1usize..16,
    ) {
        let mut lru = BoundedLru::new(capacity);
        let mut evicted = Vec::new();

        for k in 0..(capacity + extra) {
            if let Some((key, _)) = lru.put(k, ()) {
                evicted.push(key);
            }
        }

        prop_assert_eq!(evicted, (0..extra).collect::<Vec<_>>());
        prop_assert_eq!(lru.len(), capacity);
    }

    /// Property: the key read just before a full insert survives it.
    #[test]
    fn prop_read_protects_from_eviction(
        capacity in 2usize..16,
        protected in 0usize..16,
    ) {
        let protected = protected % capacity;
        let mut lru = BoundedLru::new(capacity);
        for k in 0..capacity {
            lru.put(k, ());
        }

        prop_assert!(lru.get(&protected).is_some());
        let evicted = lru.put(capacity, ());

        prop_assert!(lru.contains(&protected));
        prop_assert_ne!(evicted.map(|(k, _)| k), Some(protected));
    }
}
