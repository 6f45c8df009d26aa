//! Content-addressed vector cache.
//!
//! Keys are a hash over `model_id || composed_text`, so identical inputs hit
//! the cache regardless of which entity produced them, and a model swap
//! naturally misses everything from the previous model.

use fxhash::hash64;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub(crate) struct VectorCache {
    entries: Mutex<LruCache<u64, Vec<f32>>>,
}

impl VectorCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn key(model_id: &str, text: &str) -> u64 {
        let mut buf = Vec::with_capacity(model_id.len() + 1 + text.len());
        buf.extend_from_slice(model_id.as_bytes());
        buf.push(0);
        buf.extend_from_slice(text.as_bytes());
        hash64(&buf)
    }

    pub(crate) fn get(&self, key: u64) -> Option<Vec<f32>> {
        self.entries.lock().expect("cache lock poisoned").get(&key).cloned()
    }

    /// Insert-if-absent on the content hash: a concurrent writer that beat us
    /// produced the same bytes for the same key, so the first value wins.
    pub(crate) fn insert(&self, key: u64, vector: Vec<f32>) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if !entries.contains(&key) {
            entries.put(key, vector);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_key() {
        assert_eq!(
            VectorCache::key("model-a", "hello"),
            VectorCache::key("model-a", "hello")
        );
        assert_ne!(
            VectorCache::key("model-a", "hello"),
            VectorCache::key("model-b", "hello")
        );
        assert_ne!(
            VectorCache::key("model-a", "hello"),
            VectorCache::key("model-a", "world")
        );
    }

    #[test]
    fn model_and_text_do_not_collide_across_separator() {
        // "ab" + "c" must differ from "a" + "bc".
        assert_ne!(VectorCache::key("ab", "c"), VectorCache::key("a", "bc"));
    }

    #[test]
    fn hit_after_insert() {
        let cache = VectorCache::new(4);
        let key = VectorCache::key("m", "text");
        assert!(cache.get(key).is_none());

        cache.insert(key, vec![0.5, 0.5]);
        assert_eq!(cache.get(key), Some(vec![0.5, 0.5]));
    }

    #[test]
    fn first_insert_wins() {
        let cache = VectorCache::new(4);
        let key = VectorCache::key("m", "text");
        cache.insert(key, vec![1.0]);
        cache.insert(key, vec![2.0]);
        assert_eq!(cache.get(key), Some(vec![1.0]));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = VectorCache::new(2);
        let k1 = VectorCache::key("m", "one");
        let k2 = VectorCache::key("m", "two");
        let k3 = VectorCache::key("m", "three");

        cache.insert(k1, vec![1.0]);
        cache.insert(k2, vec![2.0]);
        cache.get(k1);
        cache.insert(k3, vec![3.0]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(k1).is_some());
        assert!(cache.get(k2).is_none());
    }
}
