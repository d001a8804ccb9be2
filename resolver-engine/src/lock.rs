//! Distributed advisory locking (spec §4.L): a local, process-local
//! implementation and a store-backed one built on
//! `GraphStore::try_acquire_lock` / `release_lock`, both behind the same
//! [`LockProvider`] trait so the merge engine and candidate discovery don't
//! care which is in use.

use async_trait::async_trait;
use dashmap::DashMap;
use resolver_core::error::{CoreError, Result};
use resolver_core::store::GraphStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lock key for create-if-absent around candidate discovery (spec §4.L).
#[must_use]
pub fn entity_resolution_key(normalized_name: &str, entity_type: &str) -> String {
    format!("entity-resolution:{normalized_name}:{entity_type}")
}

/// Lock key around a merge of two entities, order-independent so dueling
/// merges sharing an endpoint collide on the same key (spec §4.F, §4.L).
#[must_use]
pub fn merge_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("entity-resolution:merge:{a}:{b}")
    } else {
        format!("entity-resolution:merge:{b}:{a}")
    }
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    async fn try_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool>;
    async fn unlock(&self, key: &str, owner: &str) -> Result<()>;
}

/// Acquire `key`, retrying with exponential backoff until `max_retries` is
/// exhausted, at which point surface a non-retryable `LOCK_ACQUISITION_FAILED`
/// (spec §4.L retry policy).
pub async fn acquire_with_retry(
    provider: &dyn LockProvider,
    key: &str,
    owner: &str,
    ttl: Duration,
    max_retries: u32,
) -> Result<()> {
    let mut backoff = Duration::from_millis(10);
    for attempt in 0..=max_retries {
        if provider.try_lock(key, owner, ttl).await? {
            return Ok(());
        }
        if attempt == max_retries {
            break;
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(1));
    }
    Err(CoreError::LockAcquisitionFailed(format!(
        "could not acquire lock '{key}' after {max_retries} retries"
    )))
}

/// Process-local re-entrant-by-key lock (spec §4.L "Local").
pub struct LocalLockProvider {
    held: DashMap<String, (String, Instant)>,
}

impl Default for LocalLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self { held: DashMap::new() }
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn try_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let expires_at = now + ttl;
        match self.held.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert((owner.to_string(), expires_at));
                Ok(true)
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let (current_owner, current_expiry) = slot.get();
                if current_owner == owner || *current_expiry <= now {
                    slot.insert((owner.to_string(), expires_at));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn unlock(&self, key: &str, owner: &str) -> Result<()> {
        if let Some(entry) = self.held.get(key) {
            if entry.0 != owner {
                return Ok(());
            }
        } else {
            return Ok(());
        }
        self.held.remove(key);
        Ok(())
    }
}

/// Lock backed by `GraphStore::try_acquire_lock` / `release_lock`, for
/// multi-process deployments sharing one backing graph (spec §4.L
/// "Store-backed").
pub struct StoreLockProvider<S: GraphStore + ?Sized> {
    store: Arc<S>,
}

impl<S: GraphStore + ?Sized> StoreLockProvider<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: GraphStore + ?Sized> LockProvider for StoreLockProvider<S> {
    async fn try_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        self.store.try_acquire_lock(key, owner, ttl).await
    }

    async fn unlock(&self, key: &str, owner: &str) -> Result<()> {
        self.store.release_lock(key, owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_key_is_order_independent() {
        assert_eq!(merge_key("a", "b"), merge_key("b", "a"));
    }

    #[tokio::test]
    async fn local_lock_excludes_other_owners_until_released() {
        let provider = LocalLockProvider::new();
        assert!(provider.try_lock("k", "owner-1", Duration::from_secs(5)).await.unwrap());
        assert!(!provider.try_lock("k", "owner-2", Duration::from_secs(5)).await.unwrap());
        provider.unlock("k", "owner-1").await.unwrap();
        assert!(provider.try_lock("k", "owner-2", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn local_lock_same_owner_is_reentrant() {
        let provider = LocalLockProvider::new();
        assert!(provider.try_lock("k", "owner-1", Duration::from_secs(5)).await.unwrap());
        assert!(provider.try_lock("k", "owner-1", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn acquire_with_retry_fails_after_exhausting_retries() {
        let provider = LocalLockProvider::new();
        provider.try_lock("k", "owner-1", Duration::from_secs(30)).await.unwrap();
        let result = acquire_with_retry(&provider, "k", "owner-2", Duration::from_secs(30), 2).await;
        assert!(matches!(result, Err(CoreError::LockAcquisitionFailed(_))));
    }

    #[tokio::test]
    async fn acquire_with_retry_succeeds_once_lock_is_released() {
        let provider = Arc::new(LocalLockProvider::new());
        provider.try_lock("k", "owner-1", Duration::from_millis(20)).await.unwrap();

        let retry_provider = provider.clone();
        let handle = tokio::spawn(async move { acquire_with_retry(retry_provider.as_ref(), "k", "owner-2", Duration::from_secs(5), 5).await });

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(handle.await.unwrap().is_ok());
    }
}
