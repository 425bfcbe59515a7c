use log::{debug, error};

use crate::cache::Release;
use crate::types::{CacheConfig, FtlError, Result};

/// Null link
const NIL: usize = usize::MAX;

/// Arena slots reserved at construction
const INITIAL_NODES: usize = 16;

struct Node<V> {
    key: u64,
    /// `None` while the slot sits on the free list
    value: Option<V>,
    prev: usize,
    next: usize,
}

/// Capacity-bounded cache ordered strictly by recency
///
/// Nodes live in an index-addressed arena; `head` is the most recently used
/// entry and `tail` the least. Freed slots are reused before the arena grows.
///
/// # Duplicate keys
///
/// `put` never looks for an existing entry. Putting a key that is already
/// resident creates a second, independent entry; `get` then finds the more
/// recent one. Callers wanting update-in-place semantics must [`remove`] the
/// old entry first.
///
/// # Partial eviction
///
/// When the release callback fails, [`evict`] and [`teardown`] stop at the
/// failing entry, which stays resident at the cold end. Entries already
/// released are gone. Retrying resumes with the failing entry.
///
/// Not synchronized; wrap it in a lock to share it.
///
/// [`remove`]: LruCache::remove
/// [`evict`]: LruCache::evict
/// [`teardown`]: LruCache::teardown
pub struct LruCache<V, R: Release<V>> {
    nodes: Vec<Node<V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
    capacity: usize,
    evict_batch: usize,
    release: R,
}

impl<V, R: Release<V>> LruCache<V, R> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize, release: R) -> Result<Self> {
        Self::with_config(CacheConfig::with_capacity(capacity), release)
    }

    pub fn with_config(config: CacheConfig, release: R) -> Result<Self> {
        if config.capacity == 0 {
            error!("capacity is zero");
            return Err(FtlError::InvalidCapacity);
        }

        // The arena grows one node per insert up to `capacity`
        let mut nodes = Vec::new();
        nodes
            .try_reserve(config.capacity.min(INITIAL_NODES))
            .map_err(|_| FtlError::AllocationFailure)?;

        Ok(Self {
            nodes,
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
            capacity: config.capacity,
            evict_batch: config.evict_batch.max(1),
            release,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert as most recently used, evicting from the cold end first if full.
    ///
    /// If that eviction fails the new entry is not inserted.
    pub fn put(&mut self, key: u64, value: V) -> Result<()> {
        if self.len >= self.capacity {
            debug!(
                "eviction is called (size: {}, cap: {})",
                self.len, self.capacity
            );
            self.evict(self.evict_batch)?;
        }

        let idx = self.alloc_node(key, value)?;
        self.push_front(idx);
        self.len += 1;
        Ok(())
    }

    /// Look up `key`, promoting it to most recently used on a hit
    pub fn get(&mut self, key: u64) -> Option<&V> {
        let idx = self.find(key)?;
        if idx != self.head {
            self.unlink(idx);
            self.push_front(idx);
        }
        self.nodes[idx].value.as_ref()
    }

    /// Look up `key` without touching recency
    pub fn peek(&self, key: u64) -> Option<&V> {
        self.find(key).and_then(|idx| self.nodes[idx].value.as_ref())
    }

    /// Take the most recent entry for `key` out of the cache.
    ///
    /// The release callback is not invoked; the value goes back to the caller.
    pub fn remove(&mut self, key: u64) -> Option<V> {
        let idx = self.find(key)?;
        self.unlink(idx);
        self.len -= 1;
        self.free_node(idx)
    }

    /// Release and drop up to `n` entries from the least recently used end.
    ///
    /// Returns how many were evicted. On callback failure the batch stops and
    /// the error is returned.
    pub fn evict(&mut self, n: usize) -> Result<usize> {
        let mut evicted = 0;
        while evicted < n && self.tail != NIL {
            let idx = self.tail;
            let key = self.nodes[idx].key;
            if let Some(value) = self.nodes[idx].value.as_ref() {
                self.release
                    .release(key, value)
                    .map_err(|source| FtlError::CallbackFailure { key, source })?;
            }

            self.unlink(idx);
            self.free_node(idx);
            self.len -= 1;
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Release every entry, least recently used first.
    ///
    /// On failure the remaining entries stay resident and a later call picks up
    /// where this one stopped.
    pub fn teardown(&mut self) -> Result<()> {
        self.evict(self.len)?;
        self.nodes.clear();
        self.free.clear();
        Ok(())
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    /// Resident keys from most to least recently used
    pub fn keys(&self) -> Vec<u64> {
        self.iter().map(|(key, _)| key).collect()
    }

    fn find(&self, key: u64) -> Option<usize> {
        let mut it = self.head;
        while it != NIL {
            if self.nodes[it].key == key {
                return Some(it);
            }
            it = self.nodes[it].next;
        }
        None
    }

    fn alloc_node(&mut self, key: u64, value: V) -> Result<usize> {
        let node = Node {
            key,
            value: Some(value),
            prev: NIL,
            next: NIL,
        };

        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            return Ok(idx);
        }

        self.nodes
            .try_reserve(1)
            .map_err(|_| FtlError::AllocationFailure)?;
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    fn free_node(&mut self, idx: usize) -> Option<V> {
        let value = self.nodes[idx].value.take();
        self.free.push(idx);
        value
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;

        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }

        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }
}

impl<V, R: Release<V>> Drop for LruCache<V, R> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            // Remaining values are dropped without release
            error!("cache teardown failed on drop ({} left): {}", self.len, e);
        }
    }
}

/// Iterator over `(key, &value)` from most to least recently used
pub struct Iter<'a, V> {
    nodes: &'a [Node<V>],
    cursor: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor != NIL {
            let node = &self.nodes[self.cursor];
            self.cursor = node.next;
            if let Some(value) = node.value.as_ref() {
                return Some((node.key, value));
            }
        }
        None
    }
}

impl<V, R: Release<V>> std::fmt::Debug for LruCache<V, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("evict_batch", &self.evict_batch)
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoRelease;
    use crate::types::ReleaseError;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(u64, u64)>>>;

    /// Cache whose release callback records every call
    fn logging_cache(
        capacity: usize,
    ) -> (
        LruCache<u64, impl FnMut(u64, &u64) -> std::result::Result<(), ReleaseError>>,
        Log,
    ) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let cache = LruCache::new(
            capacity,
            move |key: u64, value: &u64| -> std::result::Result<(), ReleaseError> {
                sink.borrow_mut().push((key, *value));
                Ok(())
            },
        )
        .unwrap();
        (cache, log)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            LruCache::<u64, _>::new(0, NoRelease),
            Err(FtlError::InvalidCapacity)
        ));
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut cache = LruCache::new(usize::MAX, NoRelease).unwrap();
        assert!(cache.nodes.capacity() <= INITIAL_NODES);

        for key in 0..100u64 {
            cache.put(key, key).unwrap();
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.nodes.len(), 100);
        assert_eq!(cache.capacity(), usize::MAX);
    }

    #[test]
    fn test_get_promotes_then_put_evicts_coldest() {
        let (mut cache, log) = logging_cache(2);
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();
        assert_eq!(cache.get(1), Some(&10));
        cache.put(3, 30).unwrap();

        assert_eq!(*log.borrow(), vec![(2, 20)]);
        assert_eq!(cache.keys(), vec![3, 1]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_miss_is_distinct_from_zero_value() {
        let mut cache = LruCache::new(4, NoRelease).unwrap();
        cache.put(5, 0u64).unwrap();
        assert_eq!(cache.get(5), Some(&0));
        assert_eq!(cache.get(6), None);
    }

    #[test]
    fn test_duplicate_keys_are_independent() {
        let (mut cache, log) = logging_cache(4);
        cache.put(1, 10).unwrap();
        cache.put(1, 11).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1), Some(&11));
        assert_eq!(cache.remove(1), Some(11));
        assert_eq!(cache.get(1), Some(&10));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_evict_empty_is_noop() {
        let (mut cache, log) = logging_cache(2);
        assert_eq!(cache.evict(3).unwrap(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_evict_stops_at_len() {
        let (mut cache, log) = logging_cache(4);
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();
        assert_eq!(cache.evict(5).unwrap(), 2);
        assert_eq!(*log.borrow(), vec![(1, 10), (2, 20)]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_teardown_order_is_cold_to_hot() {
        let (mut cache, log) = logging_cache(4);
        for key in 1..=4 {
            cache.put(key, key * 10).unwrap();
        }
        cache.get(2);

        cache.teardown().unwrap();
        assert_eq!(*log.borrow(), vec![(1, 10), (3, 30), (4, 40), (2, 20)]);
        assert!(cache.is_empty());

        // Nothing left for drop to release
        drop(cache);
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn test_drop_releases_residents() {
        let (mut cache, log) = logging_cache(4);
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();
        drop(cache);
        assert_eq!(*log.borrow(), vec![(1, 10), (2, 20)]);
    }

    #[test]
    fn test_callback_failure_leaves_remainder() {
        let fail_on = Rc::new(RefCell::new(Some(2u64)));
        let released = Rc::new(RefCell::new(Vec::new()));
        let (fail, sink) = (Rc::clone(&fail_on), Rc::clone(&released));

        let mut cache = LruCache::<u64, _>::new(
            4,
            move |key: u64, _value: &u64| -> std::result::Result<(), ReleaseError> {
                if *fail.borrow() == Some(key) {
                    return Err(ReleaseError::new("busy"));
                }
                sink.borrow_mut().push(key);
                Ok(())
            },
        )
        .unwrap();
        for key in 1..=3 {
            cache.put(key, key).unwrap();
        }

        let err = cache.teardown().unwrap_err();
        assert!(matches!(err, FtlError::CallbackFailure { key: 2, .. }));
        assert_eq!(*released.borrow(), vec![1]);
        assert_eq!(cache.keys(), vec![3, 2]);
        assert_eq!(cache.len(), 2);

        // Retry once the callback recovers
        *fail_on.borrow_mut() = None;
        cache.teardown().unwrap();
        assert_eq!(*released.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_put_aborts_when_eviction_fails() {
        let mut cache = LruCache::<u64, _>::new(
            1,
            |_key: u64, _value: &u64| -> std::result::Result<(), ReleaseError> {
                Err(ReleaseError::new("pinned"))
            },
        )
        .unwrap();
        cache.put(1, 1).unwrap();

        assert!(cache.put(2, 2).is_err());
        assert_eq!(cache.keys(), vec![1]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict_batch() {
        let config = CacheConfig {
            capacity: 4,
            evict_batch: 2,
        };
        let mut cache = LruCache::with_config(config, NoRelease).unwrap();
        for key in 1..=5u64 {
            cache.put(key, key).unwrap();
        }
        assert_eq!(cache.keys(), vec![5, 4, 3]);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut cache = LruCache::new(2, NoRelease).unwrap();
        for key in 0..100u64 {
            cache.put(key, key).unwrap();
        }
        assert_eq!(cache.nodes.len(), 2);
        assert_eq!(cache.keys(), vec![99, 98]);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = LruCache::new(2, NoRelease).unwrap();
        cache.put(1, "a").unwrap();
        cache.put(2, "b").unwrap();
        assert_eq!(cache.peek(1), Some(&"a"));
        cache.put(3, "c").unwrap();
        assert_eq!(cache.keys(), vec![3, 2]);
    }
}
