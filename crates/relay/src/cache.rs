//! Process-local membership pre-filter.
//!
//! An entry means "this endpoint is the source of at least one connection".
//! The store stays authoritative: a hit only lets an inbound message reach
//! the real connection lookup, and a miss after restart is covered by
//! [`RoomManager::warm_cache`](crate::manager::RoomManager::warm_cache).

use {crossover_common::Endpoint, dashmap::DashSet};

#[derive(Debug, Default)]
pub struct MembershipCache {
    entries: DashSet<Endpoint>,
}

impl MembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, endpoint: Endpoint) -> bool {
        self.entries.contains(&endpoint)
    }

    /// Idempotent. Returns `true` when the entry was newly added.
    pub fn mark(&self, endpoint: Endpoint) -> bool {
        self.entries.insert(endpoint)
    }

    /// Idempotent. Returns `true` when an entry was removed.
    pub fn clear(&self, endpoint: Endpoint) -> bool {
        self.entries.remove(&endpoint).is_some()
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
    use {super::*, std::sync::Arc};

    #[test]
    fn mark_and_clear_are_idempotent() {
        let cache = MembershipCache::new();
        let ep = Endpoint::new(1, 10);

        assert!(!cache.has(ep));
        assert!(cache.mark(ep));
        assert!(!cache.mark(ep));
        assert!(cache.has(ep));
        assert_eq!(cache.len(), 1);

        assert!(cache.clear(ep));
        assert!(!cache.clear(ep));
        assert!(!cache.has(ep));
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_are_independent() {
        let cache = MembershipCache::new();
        let a = Endpoint::new(1, 10);
        let b = Endpoint::new(1, 11);

        cache.mark(a);
        cache.mark(b);
        cache.clear(a);

        assert!(!cache.has(a));
        assert!(cache.has(b));
    }

    #[test]
    fn concurrent_marks() {
        let cache = Arc::new(MembershipCache::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for ch in 0..100u64 {
                        cache.mark(Endpoint::new(i, ch));
                    }
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().is_ok());
        }
        assert_eq!(cache.len(), 800);
    }
}
