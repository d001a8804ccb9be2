//! An in-memory [`GraphStore`] backed by `dashmap`, following the teacher's
//! swappable-backend convention (`llmspell-graph::storage::GraphBackend`).
//!
//! This is the reference implementation used by the test suite and by
//! embedders who don't need a persistent backing graph. A production backend
//! (Cypher-speaking, SQL, or otherwise) implements the same
//! [`resolver_core::store::GraphStore`] trait and can be swapped in without
//! touching `resolver-engine`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use resolver_core::error::{CoreError, Result};
use resolver_core::store::{AuditQuery, GraphStore, Page, ReviewFilters};
use resolver_core::types::{
    AuditEntry, DuplicateEntity, Entity, EntityStatus, LibraryRelationship, MatchDecision,
    MergeRecord, ReviewDecision, ReviewItem, ReviewStatus, Synonym,
};

struct LockEntry {
    owner: String,
    expires_at_millis: i64,
}

/// In-memory reference implementation of [`GraphStore`].
pub struct MemoryGraphStore {
    name: String,
    entities: DashMap<String, Entity>,
    /// `source_id -> target_id` for the `MERGED_INTO` edge.
    merged_into: DashMap<String, String>,

    synonyms: DashMap<String, Synonym>,
    /// `entity_id -> [synonym_id]`.
    synonyms_by_entity: DashMap<String, Vec<String>>,
    /// `synonym_id -> owning entity_id`.
    synonym_owner: DashMap<String, String>,

    duplicates: DashMap<String, DuplicateEntity>,

    relationships: DashMap<String, LibraryRelationship>,
    /// `entity_id -> [relationship_id]`, indexed on both endpoints.
    relationships_by_entity: DashMap<String, Vec<String>>,

    match_decisions: DashMap<String, MatchDecision>,

    review_items: DashMap<String, ReviewItem>,
    review_decisions: DashMap<String, ReviewDecision>,

    merge_records: DashMap<String, MergeRecord>,
    audit_log: Mutex<Vec<AuditEntry>>,

    locks: DashMap<String, LockEntry>,
    /// Monotonic counter so the reference clock in tests can be advanced
    /// deterministically if a caller needs it; unused by production logic.
    clock_ticks: AtomicU64,
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new("in-memory")
    }
}

impl MemoryGraphStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: DashMap::new(),
            merged_into: DashMap::new(),
            synonyms: DashMap::new(),
            synonyms_by_entity: DashMap::new(),
            synonym_owner: DashMap::new(),
            duplicates: DashMap::new(),
            relationships: DashMap::new(),
            relationships_by_entity: DashMap::new(),
            match_decisions: DashMap::new(),
            review_items: DashMap::new(),
            review_decisions: DashMap::new(),
            merge_records: DashMap::new(),
            audit_log: Mutex::new(Vec::new()),
            locks: DashMap::new(),
            clock_ticks: AtomicU64::new(0),
        }
    }

    fn index_relationship(&self, rel: &LibraryRelationship) {
        self.relationships_by_entity
            .entry(rel.from_entity.clone())
            .or_default()
            .push(rel.id.clone());
        if rel.to_entity != rel.from_entity {
            self.relationships_by_entity
                .entry(rel.to_entity.clone())
                .or_default()
                .push(rel.id.clone());
        }
    }

    fn unindex_relationship(&self, rel: &LibraryRelationship) {
        if let Some(mut ids) = self.relationships_by_entity.get_mut(&rel.from_entity) {
            ids.retain(|id| id != &rel.id);
        }
        if let Some(mut ids) = self.relationships_by_entity.get_mut(&rel.to_entity) {
            ids.retain(|id| id != &rel.id);
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn is_alive(&self) -> bool {
        true
    }

    fn graph_name(&self) -> &str {
        &self.name
    }

    async fn create_indexes(&self) -> Result<()> {
        tracing::debug!(store = %self.name, "in-memory store requires no explicit index creation");
        Ok(())
    }

    // ---- Entities ----------------------------------------------------------

    async fn insert_entity(&self, entity: Entity) -> Result<()> {
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Entity> {
        self.entities
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| CoreError::NotFound(format!("entity {id}")))
    }

    async fn find_active_by_normalized_name(
        &self,
        normalized_name: &str,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Entity>> {
        Ok(self
            .entities
            .iter()
            .find(|e| {
                e.is_active()
                    && e.normalized_name == normalized_name
                    && e.entity_type == entity_type
                    && e.tenant_id.as_deref() == tenant_id
            })
            .map(|e| e.clone()))
    }

    async fn find_active_by_blocking_keys(
        &self,
        keys: &[String],
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Entity>> {
        let key_set: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(self
            .entities
            .iter()
            .filter(|e| {
                e.is_active()
                    && e.entity_type == entity_type
                    && e.tenant_id.as_deref() == tenant_id
                    && e.blocking_keys.iter().any(|k| key_set.contains(k.as_str()))
            })
            .map(|e| e.clone())
            .collect())
    }

    async fn scan_active_by_type(&self, entity_type: &str, tenant_id: Option<&str>) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .iter()
            .filter(|e| e.is_active() && e.entity_type == entity_type && e.tenant_id.as_deref() == tenant_id)
            .map(|e| e.clone())
            .collect())
    }

    async fn count_active_by_type(&self, entity_type: &str, tenant_id: Option<&str>) -> Result<usize> {
        Ok(self
            .entities
            .iter()
            .filter(|e| e.is_active() && e.entity_type == entity_type && e.tenant_id.as_deref() == tenant_id)
            .count())
    }

    async fn set_entity_status(&self, id: &str, status: EntityStatus) -> Result<()> {
        let mut entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("entity {id}")))?;
        entity.status = status;
        entity.updated_at = Utc::now();
        Ok(())
    }

    async fn link_merged_into(&self, source_id: &str, target_id: &str) -> Result<()> {
        self.merged_into.insert(source_id.to_string(), target_id.to_string());
        Ok(())
    }

    async fn unlink_merged_into(&self, source_id: &str) -> Result<()> {
        self.merged_into.remove(source_id);
        Ok(())
    }

    async fn resolve_merged_into(&self, id: &str) -> Result<String> {
        let mut current = id.to_string();
        let mut visited = HashSet::new();
        visited.insert(current.clone());
        // The invariant (spec §3) guarantees no cycles; the visited guard is
        // purely defensive against a corrupted store.
        while let Some(next) = self.merged_into.get(&current).map(|v| v.clone()) {
            if !visited.insert(next.clone()) {
                return Err(CoreError::StateInvalid(format!(
                    "cycle detected resolving MERGED_INTO chain from {id}"
                )));
            }
            current = next;
        }
        Ok(current)
    }

    // ---- Synonyms --------------------------------------------------------

    async fn insert_synonym(&self, entity_id: &str, synonym: Synonym) -> Result<()> {
        self.synonym_owner.insert(synonym.id.clone(), entity_id.to_string());
        self.synonyms_by_entity
            .entry(entity_id.to_string())
            .or_default()
            .push(synonym.id.clone());
        self.synonyms.insert(synonym.id.clone(), synonym);
        Ok(())
    }

    async fn get_synonyms_for_entity(&self, entity_id: &str) -> Result<Vec<Synonym>> {
        let Some(ids) = self.synonyms_by_entity.get(entity_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.synonyms.get(id).map(|s| s.clone()))
            .collect())
    }

    async fn find_synonym_owner(
        &self,
        normalized_value: &str,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<(Synonym, Entity)>> {
        for entry in &self.synonyms {
            if entry.normalized_value != normalized_value {
                continue;
            }
            let Some(owner_id) = self.synonym_owner.get(entry.key()).map(|v| v.clone()) else {
                continue;
            };
            let Some(owner) = self.entities.get(&owner_id) else {
                continue;
            };
            if owner.is_active() && owner.entity_type == entity_type && owner.tenant_id.as_deref() == tenant_id {
                return Ok(Some((entry.value().clone(), owner.clone())));
            }
        }
        Ok(None)
    }

    async fn find_synonym_case_insensitive(&self, entity_id: &str, normalized_value: &str) -> Result<Option<Synonym>> {
        let Some(ids) = self.synonyms_by_entity.get(entity_id) else {
            return Ok(None);
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.synonyms.get(id))
            .find(|s| s.normalized_value.eq_ignore_ascii_case(normalized_value))
            .map(|s| s.clone()))
    }

    async fn update_synonym(&self, synonym: Synonym) -> Result<()> {
        if !self.synonyms.contains_key(&synonym.id) {
            return Err(CoreError::NotFound(format!("synonym {}", synonym.id)));
        }
        self.synonyms.insert(synonym.id.clone(), synonym);
        Ok(())
    }

    async fn delete_synonym(&self, id: &str) -> Result<()> {
        if let Some((_, owner_id)) = self.synonym_owner.remove(id) {
            if let Some(mut ids) = self.synonyms_by_entity.get_mut(&owner_id) {
                ids.retain(|sid| sid != id);
            }
        }
        self.synonyms.remove(id);
        Ok(())
    }

    // ---- Duplicate entities ------------------------------------------------

    async fn insert_duplicate(&self, _target_id: &str, duplicate: DuplicateEntity) -> Result<()> {
        self.duplicates.insert(duplicate.id.clone(), duplicate);
        Ok(())
    }

    async fn delete_duplicate(&self, id: &str) -> Result<()> {
        self.duplicates.remove(id);
        Ok(())
    }

    // ---- Library relationships ---------------------------------------------

    async fn insert_relationship(&self, relationship: LibraryRelationship) -> Result<()> {
        self.index_relationship(&relationship);
        self.relationships.insert(relationship.id.clone(), relationship);
        Ok(())
    }

    async fn get_relationships_touching(&self, entity_id: &str) -> Result<Vec<LibraryRelationship>> {
        let Some(ids) = self.relationships_by_entity.get(entity_id) else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .filter_map(|id| self.relationships.get(id).map(|r| r.clone()))
            .collect())
    }

    async fn rehome_relationship(&self, relationship_id: &str, new_from: Option<String>, new_to: Option<String>) -> Result<()> {
        let mut rel = self
            .relationships
            .get_mut(relationship_id)
            .ok_or_else(|| CoreError::NotFound(format!("relationship {relationship_id}")))?;
        let old = rel.clone();
        if let Some(from) = new_from {
            rel.from_entity = from;
        }
        if let Some(to) = new_to {
            rel.to_entity = to;
        }
        let updated = rel.clone();
        drop(rel);
        self.unindex_relationship(&old);
        self.index_relationship(&updated);
        Ok(())
    }

    async fn delete_relationship(&self, id: &str) -> Result<()> {
        if let Some((_, rel)) = self.relationships.remove(id) {
            self.unindex_relationship(&rel);
        }
        Ok(())
    }

    // ---- Decision graph -----------------------------------------------------

    async fn insert_match_decision(&self, decision: MatchDecision) -> Result<()> {
        self.match_decisions.insert(decision.id.clone(), decision);
        Ok(())
    }

    async fn get_match_decision(&self, id: &str) -> Result<Option<MatchDecision>> {
        Ok(self.match_decisions.get(id).map(|r| r.clone()))
    }

    // ---- Review queue ---------------------------------------------------------

    async fn insert_review_item(&self, item: ReviewItem) -> Result<()> {
        self.review_items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn get_review_item(&self, id: &str) -> Result<ReviewItem> {
        self.review_items
            .get(id)
            .map(|i| i.clone())
            .ok_or_else(|| CoreError::NotFound(format!("review item {id}")))
    }

    async fn update_review_item(&self, item: ReviewItem) -> Result<()> {
        if !self.review_items.contains_key(&item.id) {
            return Err(CoreError::NotFound(format!("review item {}", item.id)));
        }
        self.review_items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn list_pending_reviews(&self, offset: usize, limit: usize, filters: ReviewFilters) -> Result<Page<ReviewItem>> {
        let mut matching: Vec<ReviewItem> = self
            .review_items
            .iter()
            .filter(|i| i.status == ReviewStatus::Pending)
            .filter(|i| filters.score_min.map_or(true, |min| i.similarity_score >= min))
            .filter(|i| filters.score_max.map_or(true, |max| i.similarity_score <= max))
            .map(|i| i.clone())
            .collect();
        matching.sort_by_key(|i| i.submitted_at);
        let total = matching.len();
        let items = matching.into_iter().skip(offset).take(limit).collect();
        Ok(Page { items, total })
    }

    async fn insert_review_decision(&self, decision: ReviewDecision) -> Result<()> {
        self.review_decisions.insert(decision.id.clone(), decision);
        Ok(())
    }

    // ---- Audit + merge ledger ----------------------------------------------

    async fn append_merge_record(&self, record: MergeRecord) -> Result<()> {
        self.merge_records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_merge_records_for_target(&self, target_id: &str) -> Result<Vec<MergeRecord>> {
        let mut records: Vec<MergeRecord> = self
            .merge_records
            .iter()
            .filter(|r| r.target_id == target_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.merged_at);
        Ok(records)
    }

    async fn get_merge_chain(&self, id: &str) -> Result<Vec<MergeRecord>> {
        let mut frontier = vec![id.to_string()];
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        while let Some(node) = frontier.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            for entry in &self.merge_records {
                if entry.target_id == node {
                    chain.push(entry.value().clone());
                    frontier.push(entry.source_id.clone());
                }
            }
        }
        chain.sort_by_key(|r| r.merged_at);
        Ok(chain)
    }

    async fn append_audit_entry(&self, entry: AuditEntry) -> Result<()> {
        self.audit_log.lock().push(entry);
        Ok(())
    }

    async fn query_audit(&self, query: AuditQuery) -> Result<Vec<AuditEntry>> {
        let log = self.audit_log.lock();
        let mut matching: Vec<AuditEntry> = log
            .iter()
            .filter(|e| query.entity_id.as_deref().map_or(true, |id| e.entity_id == id))
            .filter(|e| query.action.as_deref().map_or(true, |a| e.action == a))
            .filter(|e| query.actor_id.as_deref().map_or(true, |a| e.actor_id == a))
            .filter(|e| query.since.map_or(true, |since| e.recorded_at >= since))
            .filter(|e| query.until.map_or(true, |until| e.recorded_at <= until))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        if query.limit > 0 {
            matching.truncate(query.limit);
        }
        Ok(matching)
    }

    // ---- Distributed lock ---------------------------------------------------

    async fn try_acquire_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        self.clock_ticks.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now().timestamp_millis();
        let expires_at_millis = now + i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        match self.locks.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(LockEntry {
                    owner: owner.to_string(),
                    expires_at_millis,
                });
                Ok(true)
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if slot.get().expires_at_millis <= now {
                    slot.insert(LockEntry {
                        owner: owner.to_string(),
                        expires_at_millis,
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn release_lock(&self, key: &str, owner: &str) -> Result<()> {
        if let Some(entry) = self.locks.get(key) {
            if entry.owner != owner {
                return Ok(());
            }
        } else {
            return Ok(());
        }
        self.locks.remove(key);
        Ok(())
    }
}
