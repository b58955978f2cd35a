//! Bounded LRU - Arena-backed Recency List
//!
//! Fixed-capacity key/value map with O(1) `get`, `put` and eviction.
//!
//! # Design
//!
//! ```text
//!   index: HashMap<K, slot>
//!
//!   nodes: [ HEAD | TAIL | n2 | n3 | n4 | ... ]     (Vec arena, free list)
//!
//!   HEAD ──► [n4] ◄──► [n2] ◄──► [n3] ◄── TAIL
//!            MRU                 LRU
//! ```
//!
//! - Nodes live in a `Vec` and link to each other by slot index, never by
//!   pointer, so there is no shared ownership between neighbours.
//! - Slots 0 and 1 are sentinels. They carry no entry and are never
//!   returned, which keeps link/unlink free of boundary branches.
//! - Removed slots go on a free list and are reused by later inserts.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Slot of the head sentinel (MRU side)
const HEAD: usize = 0;

/// Slot of the tail sentinel (LRU side)
const TAIL: usize = 1;

/// Arena node. Sentinels and free slots have `entry == None`.
#[derive(Debug)]
struct Node<K, V> {
    entry: Option<(K, V)>,
    prev: usize,
    next: usize,
}

impl<K, V> Node<K, V> {
    fn sentinel() -> Self {
        Self {
            entry: None,
            prev: HEAD,
            next: TAIL,
        }
    }
}

/// Fixed-capacity least-recently-used cache.
///
/// Not synchronized; wrap it in a lock to share it (see [`super::L1Cache`]).
#[derive(Debug)]
pub struct BoundedLru<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
}

impl<K, V> BoundedLru<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is legal: every insert is evicted immediately.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: HashMap::with_capacity(capacity.saturating_add(1).min(1 << 16)),
            nodes: vec![Node::sentinel(), Node::sentinel()],
            free: Vec::new(),
        }
    }

    /// Look up `key` and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.move_to_front(slot);
        self.nodes[slot].entry.as_ref().map(|(_, v)| v)
    }

    /// Look up `key` without touching recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.nodes[slot].entry.as_ref().map(|(_, v)| v)
    }

    /// Insert or overwrite `key`, marking it most recently used.
    ///
    /// Returns the evicted least-recently-used entry when the insert pushed
    /// the cache over capacity. Overwrites never evict.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(entry) = self.nodes[slot].entry.as_mut() {
                entry.1 = value;
            }
            self.move_to_front(slot);
            return None;
        }

        let slot = self.alloc(key.clone(), value);
        self.index.insert(key, slot);
        self.link_front(slot);

        if self.index.len() > self.capacity {
            return self.pop_lru();
        }
        None
    }

    /// Remove `key`, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        self.release(slot).map(|(_, v)| v)
    }

    /// Evict and return the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let slot = self.nodes[TAIL].prev;
        if slot == HEAD {
            return None;
        }
        self.unlink(slot);
        let (key, value) = self.release(slot)?;
        self.index.remove(&key);
        Some((key, value))
    }

    /// Key that would be evicted next.
    pub fn peek_lru(&self) -> Option<&K> {
        self.nodes[self.nodes[TAIL].prev].entry.as_ref().map(|(k, _)| k)
    }

    /// Drop every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.truncate(2);
        self.nodes[HEAD] = Node::sentinel();
        self.nodes[TAIL] = Node::sentinel();
        self.free.clear();
    }

    /// Whether `key` is cached. Does not touch recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Iterate entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.nodes[HEAD].next,
        }
    }

    /// Keys from most to least recently used.
    pub fn keys_mru(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // -------------------------------------------------------------------------
    // List plumbing
    // -------------------------------------------------------------------------

    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            entry: Some((key, value)),
            prev: HEAD,
            next: TAIL,
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) -> Option<(K, V)> {
        let entry = self.nodes[slot].entry.take();
        self.free.push(slot);
        entry
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_front(&mut self, slot: usize) {
        let first = self.nodes[HEAD].next;
        self.nodes[slot].prev = HEAD;
        self.nodes[slot].next = first;
        self.nodes[first].prev = slot;
        self.nodes[HEAD].next = slot;
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.nodes[HEAD].next == slot {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }
}

/// Iterator over a [`BoundedLru`] in recency order (MRU first).
pub struct Iter<'a, K, V> {
    nodes: &'a [Node<K, V>],
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let node = &self.nodes[self.cursor];
        self.cursor = node.next;
        node.entry.as_ref().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
impl<K, V> BoundedLru<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Walk the list both ways and cross-check it against the index.
    pub(crate) fn assert_invariants(&self) {
        assert!(self.nodes[HEAD].entry.is_none());
        assert!(self.nodes[TAIL].entry.is_none());
        assert!(self.len() <= self.capacity);

        let mut forward = 0;
        let mut cursor = self.nodes[HEAD].next;
        let mut prev = HEAD;
        while cursor != TAIL {
            assert_eq!(self.nodes[cursor].prev, prev, "broken back link");
            let (key, _) = self.nodes[cursor]
                .entry
                .as_ref()
                .expect("live node without entry");
            assert_eq!(self.index.get(key), Some(&cursor));
            prev = cursor;
            cursor = self.nodes[cursor].next;
            forward += 1;
        }
        assert_eq!(self.nodes[TAIL].prev, prev);
        assert_eq!(forward, self.index.len());
        assert_eq!(self.nodes.len() - 2, self.index.len() + self.free.len());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_on_empty_cache() {
        let mut lru: BoundedLru<String, u32> = BoundedLru::new(3);
        assert!(lru.get("missing").is_none());
        assert!(lru.is_empty());
        lru.assert_invariants();
    }

    #[test]
    fn test_put_then_get() {
        let mut lru = BoundedLru::new(3);
        assert!(lru.put("a".to_string(), 1).is_none());
        assert_eq!(lru.get("a"), Some(&1));
        assert_eq!(lru.len(), 1);
        lru.assert_invariants();
    }

    #[test]
    fn test_read_refreshes_recency() {
        // put a, b, c; get a; put d => b is evicted
        let mut lru = BoundedLru::new(3);
        lru.put("a", 1);
        lru.put("b", 2);
        lru.put("c", 3);
        assert_eq!(lru.get("a"), Some(&1));

        let evicted = lru.put("d", 4);
        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(lru.keys_mru(), vec!["d", "a", "c"]);
        assert!(!lru.contains("b"));
        lru.assert_invariants();
    }

    #[test]
    fn test_overwrite_moves_to_front_without_eviction() {
        let mut lru = BoundedLru::new(2);
        lru.put("a", 1);
        lru.put("b", 2);

        assert!(lru.put("a", 10).is_none());
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.peek("a"), Some(&10));
        assert_eq!(lru.peek_lru(), Some(&"b"));

        assert_eq!(lru.put("c", 3), Some(("b", 2)));
        lru.assert_invariants();
    }

    #[test]
    fn test_zero_capacity_evicts_every_insert() {
        let mut lru = BoundedLru::new(0);
        assert_eq!(lru.put("a", 1), Some(("a", 1)));
        assert_eq!(lru.put("b", 2), Some(("b", 2)));
        assert!(lru.is_empty());
        assert!(lru.get("a").is_none());
        lru.assert_invariants();
    }

    #[test]
    fn test_capacity_one() {
        let mut lru = BoundedLru::new(1);
        lru.put("a", 1);
        assert_eq!(lru.put("b", 2), Some(("a", 1)));
        assert_eq!(lru.get("b"), Some(&2));
        lru.assert_invariants();
    }

    #[test]
    fn test_peek_does_not_reorder() {
        let mut lru = BoundedLru::new(2);
        lru.put("a", 1);
        lru.put("b", 2);
        assert_eq!(lru.peek("a"), Some(&1));
        assert_eq!(lru.put("c", 3), Some(("a", 1)));
    }

    #[test]
    fn test_remove_and_slot_reuse() {
        let mut lru = BoundedLru::new(3);
        lru.put("a", 1);
        lru.put("b", 2);
        lru.put("c", 3);

        assert_eq!(lru.remove("b"), Some(2));
        assert_eq!(lru.remove("b"), None);
        assert_eq!(lru.keys_mru(), vec!["c", "a"]);
        lru.assert_invariants();

        // Reuses the freed slot instead of growing the arena
        lru.put("d", 4);
        assert_eq!(lru.nodes.len(), 5);
        assert_eq!(lru.keys_mru(), vec!["d", "c", "a"]);
        lru.assert_invariants();
    }

    #[test]
    fn test_pop_lru_order() {
        let mut lru = BoundedLru::new(3);
        lru.put(1, "one");
        lru.put(2, "two");
        lru.put(3, "three");
        lru.get(&1);

        assert_eq!(lru.pop_lru(), Some((2, "two")));
        assert_eq!(lru.pop_lru(), Some((3, "three")));
        assert_eq!(lru.pop_lru(), Some((1, "one")));
        assert_eq!(lru.pop_lru(), None);
        lru.assert_invariants();
    }

    #[test]
    fn test_clear() {
        let mut lru = BoundedLru::new(4);
        for i in 0..4 {
            lru.put(i, i * 10);
        }
        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.capacity(), 4);
        assert!(lru.peek_lru().is_none());
        lru.assert_invariants();

        lru.put(7, 70);
        assert_eq!(lru.get(&7), Some(&70));
    }

    #[test]
    fn test_recently_read_key_survives_full_turnover() {
        let capacity = 5;
        let mut lru = BoundedLru::new(capacity);
        for i in 0..capacity {
            lru.put(i, i);
        }

        lru.get(&0);
        for i in 100..100 + capacity - 1 {
            lru.put(i, i);
        }

        assert!(lru.contains(&0));
        for i in 1..capacity {
            assert!(!lru.contains(&i), "key {} should have been evicted", i);
        }
        lru.assert_invariants();
    }

    #[test]
    fn test_iter_matches_recency() {
        let mut lru = BoundedLru::new(3);
        lru.put("x", 1);
        lru.put("y", 2);
        lru.get("x");

        let items: Vec<_> = lru.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(items, vec![("x", 1), ("y", 2)]);
    }
}
