//! In-process cache with a pluggable expiry policy
//!
//! Tenant configuration and knowledge text are both cached per tenant id.
//! Entries are immutable values replaced wholesale, so concurrent writers are
//! last-writer-wins and readers never observe a partial update.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// When a cached entry stops being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Entries live until explicitly invalidated
    Never,
    /// Entries expire this long after they were set
    After(Duration),
}

impl ExpiryPolicy {
    /// `0` means no expiry
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Never
        } else {
            Self::After(Duration::from_secs(secs))
        }
    }

    fn is_expired(&self, inserted_at: Instant) -> bool {
        match self {
            Self::Never => false,
            Self::After(ttl) => inserted_at.elapsed() >= *ttl,
        }
    }
}

/// Cache operations shared by the tenant resolver and knowledge store
pub trait Cache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&self, key: K, value: V);
    /// Returns true if an entry was removed
    fn invalidate(&self, key: &K) -> bool;
    fn clear(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// HashMap-backed cache guarded by a `parking_lot::RwLock`
pub struct MemoryCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    policy: ExpiryPolicy,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }
}

impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !self.policy.is_expired(entry.inserted_at) => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it so the map does not grow with dead tenants
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            if self.policy.is_expired(entry.inserted_at) {
                entries.remove(key);
            }
        }
        None
    }

    fn set(&self, key: K, value: V) {
        self.entries.write().insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_invalidate() {
        let cache: MemoryCache<String, u32> = MemoryCache::new(ExpiryPolicy::Never);
        cache.set("acme".to_string(), 1);
        assert_eq!(cache.get(&"acme".to_string()), Some(1));

        cache.set("acme".to_string(), 2);
        assert_eq!(cache.get(&"acme".to_string()), Some(2));

        assert!(cache.invalidate(&"acme".to_string()));
        assert!(!cache.invalidate(&"acme".to_string()));
        assert_eq!(cache.get(&"acme".to_string()), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: MemoryCache<&'static str, u32> =
            MemoryCache::new(ExpiryPolicy::After(Duration::from_millis(20)));
        cache.set("acme", 7);
        assert_eq!(cache.get(&"acme"), Some(7));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"acme"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_policy_from_secs() {
        assert_eq!(ExpiryPolicy::from_secs(0), ExpiryPolicy::Never);
        assert_eq!(
            ExpiryPolicy::from_secs(600),
            ExpiryPolicy::After(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_clear() {
        let cache: MemoryCache<u8, u8> = MemoryCache::new(ExpiryPolicy::Never);
        cache.set(1, 1);
        cache.set(2, 2);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
