//! Decompressed segment cache.
//!
//! Several container entries usually share one compressed segment, so the
//! bundle reader keeps decompressed segments around instead of inflating
//! the same block for every entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Thread-safe, append-only cache of decompressed segments keyed by index.
///
/// Uses `parking_lot::RwLock` for non-poisoning locks and `AtomicUsize`
/// for lock-free size tracking. Entries are never evicted; once the byte
/// budget is spent, further segments are simply not cached.
pub struct SegmentCache {
    /// Cache storage.
    segments: RwLock<HashMap<usize, Arc<[u8]>>>,
    /// Maximum cache size in bytes.
    max_size: usize,
    /// Current cache size in bytes.
    current_size: AtomicUsize,
}

impl SegmentCache {
    /// Create a cache holding at most `max_size` decompressed bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
            max_size,
            current_size: AtomicUsize::new(0),
        }
    }

    /// Create a cache with default size (64 MB).
    pub fn default_size() -> Self {
        Self::new(DEFAULT_CACHE_BYTES)
    }

    /// Get a decompressed segment if it was cached.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Arc<[u8]>> {
        self.segments.read().get(&index).cloned()
    }

    /// Cache a decompressed segment and hand back the shared copy.
    ///
    /// When another reader cached the same segment first, its copy wins.
    pub fn insert(&self, index: usize, data: Vec<u8>) -> Arc<[u8]> {
        let data: Arc<[u8]> = data.into();
        let size = data.len();

        let mut segments = self.segments.write();
        if let Some(existing) = segments.get(&index) {
            return Arc::clone(existing);
        }
        if self.current_size.load(Ordering::Relaxed) + size > self.max_size {
            return data;
        }
        segments.insert(index, Arc::clone(&data));
        self.current_size.fetch_add(size, Ordering::Relaxed);
        data
    }

    /// Get the number of cached segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    /// Check if cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get current cache size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Get maximum cache size in bytes.
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Default segment cache budget.
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

impl Default for SegmentCache {
    fn default() -> Self {
        Self::default_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_insert_get() {
        let cache = SegmentCache::new(1024);
        let data = vec![1, 2, 3, 4, 5];

        cache.insert(3, data.clone());

        let result = cache.get(3);
        assert!(result.is_some());
        assert_eq!(&*result.unwrap(), &data[..]);
        assert_eq!(cache.size(), 5);
    }

    #[test]
    fn test_cache_miss() {
        let cache = SegmentCache::new(1024);
        assert!(cache.get(0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = SegmentCache::new(1024);
        cache.insert(0, vec![1, 1]);
        let shared = cache.insert(0, vec![2, 2]);
        assert_eq!(&*shared, &[1, 1]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_budget_exhausted() {
        let cache = SegmentCache::new(50);
        for i in 0..10 {
            let returned = cache.insert(i, vec![0u8; 10]);
            assert_eq!(returned.len(), 10);
        }
        // Append-only: the first five fit, the rest are handed back uncached
        assert_eq!(cache.len(), 5);
        assert!(cache.get(0).is_some());
        assert!(cache.get(9).is_none());
    }

    #[test]
    fn test_cache_skip_large() {
        let cache = SegmentCache::new(100);
        cache.insert(0, vec![0u8; 200]);
        assert!(cache.get(0).is_none());
    }
}
