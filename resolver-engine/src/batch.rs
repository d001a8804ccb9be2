//! Batch resolution context (spec §4.I): intra-batch dedup ahead of a
//! chunked commit, with a hard ceiling on buffered memory.
//!
//! The batch holds no locks of its own; each buffered name is resolved
//! through the same [`Resolver::resolve`] path a single call would use, just
//! grouped into commit chunks so a caller pushing thousands of names doesn't
//! pay one round-trip per name synchronously.

use resolver_core::error::{CoreError, Result};
use std::collections::HashMap;

use crate::resolver::{ResolveOutcome, Resolver};

struct PendingName {
    canonical_name: String,
    entity_type: String,
    tenant_id: Option<String>,
    /// Raw names of later `enqueue` calls that normalized to the same key as
    /// this entry and folded into its slot (spec §4.I: "order of enqueue
    /// determines which input wins canonicalName; later equivalents become
    /// synonyms"). Attached as synonyms of this entry's resolved entity once
    /// `commit` resolves it.
    folded_raw_names: Vec<String>,
}

/// Per-entry outcome of [`BatchContext::commit`].
pub struct BatchEntryResult {
    pub canonical_name: String,
    pub outcome: ResolveOutcome,
}

/// Summary of a completed batch commit.
pub struct BatchResult {
    pub results: Vec<BatchEntryResult>,
    pub duplicates_folded: usize,
    pub chunks_committed: usize,
}

/// Rough per-entry memory estimate: the struct's stack footprint plus the
/// heap bytes of its two owned strings, enough to bound a pathological batch
/// without pretending to be an exact allocator accounting (spec §4.I).
fn estimated_entry_bytes(name: &str, entity_type: &str) -> u64 {
    (std::mem::size_of::<PendingName>() + name.len() + entity_type.len()) as u64
}

pub struct BatchContext<'a> {
    resolver: &'a Resolver,
    pending: Vec<PendingName>,
    dedup: HashMap<(String, String), usize>,
    memory_used: u64,
    max_memory_bytes: u64,
    chunk_size: usize,
    duplicates_folded: usize,
}

impl<'a> BatchContext<'a> {
    #[must_use]
    pub fn new(resolver: &'a Resolver) -> Self {
        let options = resolver.options();
        Self {
            resolver,
            pending: Vec::new(),
            dedup: HashMap::new(),
            memory_used: 0,
            max_memory_bytes: options.max_batch_memory_bytes,
            chunk_size: options.batch_commit_chunk_size.max(1),
            duplicates_folded: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Enqueue a name for resolution. Returns the index into the eventual
    /// [`BatchResult::results`] this entry's outcome will land at — whether
    /// this call queued a new entry or folded into an existing one.
    pub fn enqueue(&mut self, canonical_name: &str, entity_type: &str, tenant_id: Option<&str>) -> Result<usize> {
        let normalized = self.resolver.normalizer().normalize(canonical_name, entity_type);
        let dedup_key = (normalized, entity_type.to_string());

        if let Some(&index) = self.dedup.get(&dedup_key) {
            self.duplicates_folded += 1;
            self.pending[index].folded_raw_names.push(canonical_name.to_string());
            return Ok(index);
        }

        let bytes = estimated_entry_bytes(canonical_name, entity_type);
        if self.memory_used + bytes > self.max_memory_bytes {
            return Err(CoreError::BatchMemoryExceeded(format!(
                "enqueueing '{canonical_name}' would exceed the {}-byte batch ceiling",
                self.max_memory_bytes
            )));
        }

        let index = self.pending.len();
        self.pending.push(PendingName {
            canonical_name: canonical_name.to_string(),
            entity_type: entity_type.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            folded_raw_names: Vec::new(),
        });
        self.memory_used += bytes;
        self.dedup.insert(dedup_key, index);
        Ok(index)
    }

    /// Commit every buffered name in chunks of `batchCommitChunkSize`
    /// (spec §4.I). One-way: the returned [`BatchResult`] is the only
    /// inspection point, there is no partial-commit rollback across chunks.
    pub async fn commit(self) -> Result<BatchResult> {
        let max_batch = self.resolver.options().max_batch_size;
        if self.pending.len() > max_batch {
            return Err(CoreError::BatchTooLarge(format!(
                "batch of {} entries exceeds the {max_batch}-entry ceiling",
                self.pending.len()
            )));
        }

        let duplicates_folded = self.duplicates_folded;
        let mut results = Vec::with_capacity(self.pending.len());
        let mut chunks_committed = 0;

        for chunk in self.pending.chunks(self.chunk_size) {
            for entry in chunk {
                let outcome = self
                    .resolver
                    .resolve(&entry.canonical_name, &entry.entity_type, entry.tenant_id.as_deref())
                    .await?;

                // Later equivalents folded into this slot during enqueue
                // become synonyms of whatever entity this slot resolved to
                // (spec §4.I); the winning canonicalName stays the first one
                // enqueued, which is the name `resolve` above was called
                // with.
                if !entry.folded_raw_names.is_empty() {
                    let entity_id = outcome.entity_reference.original_id().to_string();
                    for raw_name in &entry.folded_raw_names {
                        let normalized = self.resolver.normalizer().normalize(raw_name, &entry.entity_type);
                        self.resolver
                            .attach_or_reinforce_synonym(raw_name, &normalized, &entity_id, outcome.match_confidence)
                            .await?;
                    }
                }

                results.push(BatchEntryResult {
                    canonical_name: entry.canonical_name.clone(),
                    outcome,
                });
            }
            chunks_committed += 1;
        }

        Ok(BatchResult {
            results,
            duplicates_folded,
            chunks_committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResolutionCache;
    use crate::lock::LocalLockProvider;
    use resolver_core::config::ResolutionOptions;
    use resolver_core::events::EventBus;
    use resolver_core::llm::NoopLlmJudge;
    use resolver_core::store::GraphStore;
    use resolver_graph::MemoryGraphStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn build_resolver() -> Resolver {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryGraphStore::default());
        let options = ResolutionOptions::default();
        Resolver::new(
            store,
            options,
            Arc::new(LocalLockProvider::new()),
            Arc::new(EventBus::new()),
            Arc::new(ResolutionCache::new(1000, Duration::from_secs(60))),
            Arc::new(NoopLlmJudge),
        )
    }

    #[test]
    fn enqueueing_the_same_normalized_name_twice_folds_to_one_slot() {
        let resolver = build_resolver();
        let mut batch = BatchContext::new(&resolver);
        let first = batch.enqueue("Acme Corp", "COMPANY", None).unwrap();
        let second = batch.enqueue("ACME CORP", "COMPANY", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn distinct_names_each_get_their_own_slot() {
        let resolver = build_resolver();
        let mut batch = BatchContext::new(&resolver);
        batch.enqueue("Acme Corp", "COMPANY", None).unwrap();
        batch.enqueue("Globex Inc", "COMPANY", None).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn commit_resolves_every_distinct_entry() {
        let resolver = build_resolver();
        let mut batch = BatchContext::new(&resolver);
        batch.enqueue("Acme Corp", "COMPANY", None).unwrap();
        batch.enqueue("Globex Inc", "COMPANY", None).unwrap();
        batch.enqueue("ACME CORP", "COMPANY", None).unwrap();

        let result = batch.commit().await.unwrap();
        assert_eq!(result.results.len(), 2);
        assert!(result.results.iter().all(|r| r.outcome.is_new_entity));
    }

    #[tokio::test]
    async fn later_equivalent_folded_at_enqueue_becomes_a_synonym_of_the_winner() {
        let resolver = build_resolver();
        let mut batch = BatchContext::new(&resolver);
        batch.enqueue("Acme Corp", "COMPANY", None).unwrap();
        batch.enqueue("ACME CORP", "COMPANY", None).unwrap();

        let result = batch.commit().await.unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].canonical_name, "Acme Corp");

        let entity_id = result.results[0].outcome.entity_reference.original_id().to_string();
        let normalized = resolver.normalizer().normalize("ACME CORP", "COMPANY");
        let synonym = resolver
            .store()
            .find_synonym_case_insensitive(&entity_id, &normalized)
            .await
            .unwrap();
        assert!(synonym.is_some(), "later equivalent name should have become a synonym of the winning entity");
    }

    #[test]
    fn enqueue_past_memory_ceiling_is_rejected() {
        let resolver = build_resolver();
        let mut batch = BatchContext::new(&resolver);
        batch.max_memory_bytes = 8;
        let result = batch.enqueue("a name long enough to exceed the ceiling", "COMPANY", None);
        assert!(matches!(result, Err(CoreError::BatchMemoryExceeded(_))));
    }
}
