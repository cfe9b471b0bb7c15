//! Bounded LRU cache for fully hydrated messages
//!
//! Slab-allocated nodes threaded on an intrusive doubly-linked list give
//! O(1) get, insert and eviction. Keys are the stringified message key.

use std::collections::HashMap;

/// Sentinel for "no node" in the linked list
const NIL: usize = usize::MAX;

struct Node<V> {
    key: String,
    value: V,
    prev: usize,
    next: usize,
}

/// Hit, miss and eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`; 0.0 before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Least-recently-used cache with a fixed capacity
pub struct LruCache<V> {
    index: HashMap<String, usize>,
    slab: Vec<Node<V>>,
    free: Vec<usize>,
    /// Most recently used
    head: usize,
    /// Least recently used
    tail: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> LruCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            slab: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a key, promoting it to most recently used on hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let Some(&slot) = self.index.get(key) else {
            self.misses += 1;
            return None;
        };
        self.hits += 1;
        self.detach(slot);
        self.push_front(slot);
        Some(&self.slab[slot].value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace an entry
    ///
    /// Returns the key evicted to make room, if any.
    pub fn insert(&mut self, key: String, value: V) -> Option<String> {
        if let Some(&slot) = self.index.get(&key) {
            self.slab[slot].value = value;
            self.detach(slot);
            self.push_front(slot);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.evict_tail()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slab[slot] = node;
                slot
            }
            None => {
                self.slab.push(node);
                self.slab.len() - 1
            }
        };

        self.index.insert(key, slot);
        self.push_front(slot);
        evicted
    }

    /// Drop every entry; counters are kept
    pub fn clear(&mut self) {
        self.index.clear();
        self.slab.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
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

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn detach(&mut self, slot: usize) {
        let prev = self.slab[slot].prev;
        let next = self.slab[slot].next;

        if prev == NIL {
            self.head = next;
        } else {
            self.slab[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.slab[next].prev = prev;
        }

        self.slab[slot].prev = NIL;
        self.slab[slot].next = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        self.slab[slot].prev = NIL;
        self.slab[slot].next = self.head;

        if self.head != NIL {
            self.slab[self.head].prev = slot;
        }
        self.head = slot;

        if self.tail == NIL {
            self.tail = slot;
        }
    }

    fn evict_tail(&mut self) -> Option<String> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        self.detach(slot);
        let key = self.slab[slot].key.clone();
        self.index.remove(&key);
        self.free.push(slot);
        self.evictions += 1;
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = LruCache::new(3);
        cache.insert("1.1".to_string(), 10);

        assert_eq!(cache.get("1.1"), Some(&10));
        assert_eq!(cache.get("1.2"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = LruCache::new(10);
        for i in 0..25 {
            cache.insert(format!("1.{}", i), i);
            assert!(cache.len() <= 10);
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.stats().evictions, 15);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(3);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("c".to_string(), 3);

        // promote "a"; "b" becomes the oldest
        assert!(cache.get("a").is_some());

        let evicted = cache.insert("d".to_string(), 4);
        assert_eq!(evicted.as_deref(), Some("b"));
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_replace_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        assert_eq!(cache.insert("a".to_string(), 5), None);
        assert_eq!(cache.get("a"), Some(&5));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);

        // "b" is now the oldest
        assert_eq!(cache.insert("c".to_string(), 3).as_deref(), Some("b"));
    }

    #[test]
    fn test_slots_are_reused() {
        let mut cache = LruCache::new(1);
        for i in 0..100 {
            cache.insert(i.to_string(), i);
        }
        assert_eq!(cache.slab.len(), 1);
        assert_eq!(cache.get("99"), Some(&99));
    }

    #[test]
    fn test_clear_and_stats() {
        let mut cache = LruCache::new(4);
        cache.insert("a".to_string(), 1);
        cache.get("a");
        cache.get("z");

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }
}
