//! Kernel cache implementation
//!
//! Provides an LRU cache for kernel values so pairwise evaluation paths do not
//! recompute entries. For a symmetric kernel K(i,j) == K(j,i) and only one
//! entry per unordered pair is kept; see [`crate::Kernel::is_symmetric`].

use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key for kernel values, normalized so that i <= j when symmetric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    i: usize,
    j: usize,
}

impl CacheKey {
    fn new(i: usize, j: usize, symmetric: bool) -> Self {
        if !symmetric || i <= j {
            Self { i, j }
        } else {
            Self { i: j, j: i }
        }
    }
}

/// LRU cache for kernel matrix values
pub struct KernelCache {
    cache: LruCache<CacheKey, f64>,
    symmetric: bool,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache with specified capacity in number of entries
    pub fn new(capacity: usize, symmetric: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            symmetric,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a kernel cache with capacity based on memory size in bytes
    /// Assumes 8 bytes per f64 value + overhead
    pub fn with_memory_limit(memory_bytes: usize, symmetric: bool) -> Self {
        let capacity = (memory_bytes / 32).max(1); // 16 bytes key + 8 bytes value + overhead
        Self::new(capacity, symmetric)
    }

    /// Whether (i, j) and (j, i) share an entry
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Get a kernel value from cache
    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        let key = CacheKey::new(i, j, self.symmetric);
        if let Some(&value) = self.cache.get(&key) {
            self.hits += 1;
            Some(value)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Put a kernel value into cache
    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        let key = CacheKey::new(i, j, self.symmetric);
        self.cache.put(key, value);
    }

    /// Cached value or the result of `compute`, which is then stored
    pub fn get_or_insert_with<F: FnOnce() -> f64>(&mut self, i: usize, j: usize, compute: F) -> f64 {
        match self.get(i, j) {
            Some(value) => value,
            None => {
                let value = compute();
                self.put(i, j, value);
                value
            }
        }
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}
