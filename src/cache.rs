use dashmap::DashMap;

/// Which comparison a cached value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheToken {
    ClassMethodSignatures,
    ClassMethodCode,
    ClassMemberRefs,
}

/// Process-wide comparison cache shared by classifier worker threads.
///
/// Every accepted match or unmatch clears the whole cache; there is no
/// per-entry invalidation.
#[derive(Debug, Default)]
pub struct MatchingCache {
    entries: DashMap<(CacheToken, u32, u32), f64>,
}

impl MatchingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value or compute and store it.
    ///
    /// The computation runs without holding a shard lock, so it may consult
    /// the cache itself; concurrent misses may compute the same value twice.
    pub fn get_or_compute(
        &self,
        token: CacheToken,
        a: u32,
        b: u32,
        compute: impl FnOnce() -> f64,
    ) -> f64 {
        if let Some(value) = self.entries.get(&(token, a, b)) {
            return *value;
        }
        let value = compute();
        self.entries.insert((token, a, b), value);
        value
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn caches_until_cleared() {
        let cache = MatchingCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            0.5
        };

        assert_eq!(0.5, cache.get_or_compute(CacheToken::ClassMethodCode, 1, 2, compute));
        assert_eq!(0.5, cache.get_or_compute(CacheToken::ClassMethodCode, 1, 2, || 9.0));
        assert_eq!(1, calls.get());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(9.0, cache.get_or_compute(CacheToken::ClassMethodCode, 1, 2, || 9.0));
    }

    #[test]
    fn tokens_keep_entries_apart() {
        let cache = MatchingCache::new();
        cache.get_or_compute(CacheToken::ClassMethodCode, 1, 2, || 0.1);
        let other = cache.get_or_compute(CacheToken::ClassMemberRefs, 1, 2, || 0.7);
        assert_eq!(0.7, other);
        assert_eq!(2, cache.len());
    }
}
