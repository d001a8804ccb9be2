//! Resolution cache (spec §4.M): `(normalizedName, type) → prior result`,
//! bounded LRU with TTL, invalidated on merge events. The cache is a
//! [`MergeListener`], not an implementer of resolution logic (spec §9
//! design notes).

use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use resolver_core::events::{MergeEvent, MergeListener, ReviewDecided, ReviewSubmitted};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CachedResolution {
    pub entity_id: String,
    pub confidence: f64,
}

struct CacheEntry {
    value: CachedResolution,
    inserted_at: Instant,
}

/// Primary key: `(normalizedName, type)`, joined as a single string so the
/// LRU cache can use it directly without a tuple-hashing dependency.
fn primary_key(normalized_name: &str, entity_type: &str) -> String {
    format!("{entity_type}:{normalized_name}")
}

pub struct ResolutionCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    /// `entityId -> set<primaryKey>` for targeted invalidation on merge.
    by_entity: DashMap<String, Vec<String>>,
}

impl ResolutionCache {
    #[must_use]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            by_entity: DashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, normalized_name: &str, entity_type: &str) -> Option<CachedResolution> {
        let key = primary_key(normalized_name, entity_type);
        let mut cache = self.inner.lock();
        let entry = cache.get(&key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            cache.pop(&key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, normalized_name: &str, entity_type: &str, value: CachedResolution) {
        let key = primary_key(normalized_name, entity_type);
        self.by_entity.entry(value.entity_id.clone()).or_default().push(key.clone());
        self.inner.lock().put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop all entries keyed to `entity_id`.
    pub fn invalidate_entity(&self, entity_id: &str) {
        if let Some((_, keys)) = self.by_entity.remove(entity_id) {
            let mut cache = self.inner.lock();
            for key in keys {
                cache.pop(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MergeListener for ResolutionCache {
    async fn on_merge(&self, event: &MergeEvent) {
        self.invalidate_entity(&event.source_id);
        self.invalidate_entity(&event.target_id);
    }

    async fn on_review_submitted(&self, _event: &ReviewSubmitted) {}
    async fn on_review_decided(&self, _event: &ReviewDecided) {}

    fn name(&self) -> &str {
        "resolution_cache"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let cache = ResolutionCache::new(10, Duration::from_secs(60));
        cache.put("acme", "COMPANY", CachedResolution { entity_id: "e-1".to_string(), confidence: 1.0 });
        let got = cache.get("acme", "COMPANY").unwrap();
        assert_eq!(got.entity_id, "e-1");
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = ResolutionCache::new(10, Duration::from_millis(1));
        cache.put("acme", "COMPANY", CachedResolution { entity_id: "e-1".to_string(), confidence: 1.0 });
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("acme", "COMPANY").is_none());
    }

    #[tokio::test]
    async fn merge_event_invalidates_both_endpoints() {
        let cache = ResolutionCache::new(10, Duration::from_secs(60));
        cache.put("acme", "COMPANY", CachedResolution { entity_id: "src".to_string(), confidence: 1.0 });
        cache.put("acme corp", "COMPANY", CachedResolution { entity_id: "tgt".to_string(), confidence: 1.0 });

        cache
            .on_merge(&MergeEvent {
                source_id: "src".to_string(),
                target_id: "tgt".to_string(),
                at: chrono::Utc::now(),
            })
            .await;

        assert!(cache.get("acme", "COMPANY").is_none());
        assert!(cache.get("acme corp", "COMPANY").is_none());
    }

    #[test]
    fn lru_evicts_least_recently_used_beyond_capacity() {
        let cache = ResolutionCache::new(1, Duration::from_secs(60));
        cache.put("acme", "COMPANY", CachedResolution { entity_id: "e-1".to_string(), confidence: 1.0 });
        cache.put("globex", "COMPANY", CachedResolution { entity_id: "e-2".to_string(), confidence: 1.0 });
        assert!(cache.get("acme", "COMPANY").is_none());
        assert!(cache.get("globex", "COMPANY").is_some());
    }
}
