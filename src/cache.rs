//! Short-TTL in-process result cache.
//!
//! Purely a latency optimization for repeat autocomplete keystrokes: keyed
//! by normalized query text + country, replace-on-expiry, no invalidation.
//! Expired entries are overwritten on the next insert for the same key.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::common::types::ResolveOutcome;

struct CacheEntry {
    stored_at: Instant,
    outcome: ResolveOutcome,
}

pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    /// A zero TTL disables the cache entirely
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(query: &str, country: &str) -> String {
        format!("{}|{}", query.trim().to_lowercase(), country.to_uppercase())
    }

    pub fn get(&self, query: &str, country: &str) -> Option<ResolveOutcome> {
        if self.ttl.is_zero() {
            return None;
        }
        let entries = self.entries.read().ok()?;
        let entry = entries.get(&Self::key(query, country))?;
        if entry.stored_at.elapsed() <= self.ttl {
            Some(entry.outcome.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, query: &str, country: &str, outcome: ResolveOutcome) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                Self::key(query, country),
                CacheEntry {
                    stored_at: Instant::now(),
                    outcome,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.insert("SW1A 1AA", "GB", ResolveOutcome::empty());
        assert!(cache.get("sw1a 1aa", "gb").is_some());
        assert!(cache.get("SW1A 1AA", "GB").is_some());
    }

    #[test]
    fn test_miss_on_different_key() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.insert("SW1A 1AA", "GB", ResolveOutcome::empty());
        assert!(cache.get("SW1A 1AB", "GB").is_none());
        assert!(cache.get("SW1A 1AA", "IE").is_none());
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = ResultCache::new(Duration::from_millis(5));
        cache.insert("SW1A 1AA", "GB", ResolveOutcome::empty());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("SW1A 1AA", "GB").is_none());
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = ResultCache::new(Duration::ZERO);
        cache.insert("SW1A 1AA", "GB", ResolveOutcome::empty());
        assert!(cache.get("SW1A 1AA", "GB").is_none());
    }
}
