//! The graph store contract (spec §6): the only interface the resolution
//! core consumes from the underlying property graph.
//!
//! The source specification allows any backing query language as long as the
//! contract holds (spec.md §9 design notes); rather than shipping a raw
//! `execute(query, params)` / `query(query, params)` pair and asking every
//! caller to hand-roll query strings, this follows the teacher's
//! `KnowledgeGraph` trait convention (`llmspell-graph::traits::KnowledgeGraph`)
//! and exposes one typed async method per capability the core needs. A
//! concrete backend (Cypher, SQL, or the in-memory reference implementation
//! in `resolver-graph`) is free to implement each method however it likes.

use crate::error::Result;
use crate::reference::MergeTraversal;
use crate::types::{
    AuditEntry, DuplicateEntity, Entity, EntityStatus, LibraryRelationship, MatchDecision,
    MergeRecord, ReviewDecision, ReviewItem, Synonym,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A page of results plus the total count, for offset/limit pagination (§4.J).
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Filters accepted by [`GraphStore::list_pending_reviews`] (§4.J).
#[derive(Debug, Clone, Default)]
pub struct ReviewFilters {
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
}

/// Filters accepted by audit/ledger cursor queries (§4.K).
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: usize,
}

/// The property-graph contract the resolution core depends on.
///
/// Implementations must create secondary indexes on `Entity.id`,
/// `Entity.normalized_name`, `Entity.type`, `Entity.status`,
/// `Synonym.normalized_value`, and `Lock.key`, and guarantee that a write is
/// durable before the corresponding method returns (spec §6).
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Liveness check for the underlying store connection.
    async fn is_alive(&self) -> bool;

    /// A human-readable name for the backing graph/database, for logging.
    fn graph_name(&self) -> &str;

    /// Create the secondary indexes this contract requires. Implementations
    /// that don't need explicit index creation (e.g. an in-memory map) may
    /// treat this as a no-op.
    async fn create_indexes(&self) -> Result<()>;

    // ---- Entities ------------------------------------------------------
    async fn insert_entity(&self, entity: Entity) -> Result<()>;
    async fn get_entity(&self, id: &str) -> Result<Entity>;
    async fn find_active_by_normalized_name(
        &self,
        normalized_name: &str,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Entity>>;
    async fn find_active_by_blocking_keys(
        &self,
        keys: &[String],
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Entity>>;
    async fn scan_active_by_type(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Entity>>;
    async fn count_active_by_type(&self, entity_type: &str, tenant_id: Option<&str>) -> Result<usize>;
    async fn set_entity_status(&self, id: &str, status: EntityStatus) -> Result<()>;
    /// Create the `MERGED_INTO` edge `source -> target`.
    async fn link_merged_into(&self, source_id: &str, target_id: &str) -> Result<()>;
    /// Remove the `MERGED_INTO` edge from `source_id`, if any (merge compensation).
    async fn unlink_merged_into(&self, source_id: &str) -> Result<()>;
    /// Follow `MERGED_INTO*` from `id` to its terminal ACTIVE id.
    async fn resolve_merged_into(&self, id: &str) -> Result<String>;

    // ---- Synonyms --------------------------------------------------------
    async fn insert_synonym(&self, entity_id: &str, synonym: Synonym) -> Result<()>;
    async fn get_synonyms_for_entity(&self, entity_id: &str) -> Result<Vec<Synonym>>;
    /// Find the ACTIVE entity reachable via a synonym whose normalized value
    /// matches, plus the synonym itself (§4.D stage 2).
    async fn find_synonym_owner(
        &self,
        normalized_value: &str,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<(Synonym, Entity)>>;
    async fn find_synonym_case_insensitive(
        &self,
        entity_id: &str,
        normalized_value: &str,
    ) -> Result<Option<Synonym>>;
    async fn update_synonym(&self, synonym: Synonym) -> Result<()>;
    async fn delete_synonym(&self, id: &str) -> Result<()>;

    // ---- Duplicate entities ----------------------------------------------
    async fn insert_duplicate(&self, target_id: &str, duplicate: DuplicateEntity) -> Result<()>;
    async fn delete_duplicate(&self, id: &str) -> Result<()>;

    // ---- Library relationships --------------------------------------------
    async fn insert_relationship(&self, relationship: LibraryRelationship) -> Result<()>;
    /// All relationships with `entity_id` as either endpoint.
    async fn get_relationships_touching(&self, entity_id: &str) -> Result<Vec<LibraryRelationship>>;
    async fn rehome_relationship(
        &self,
        relationship_id: &str,
        new_from: Option<String>,
        new_to: Option<String>,
    ) -> Result<()>;
    async fn delete_relationship(&self, id: &str) -> Result<()>;

    // ---- Decision graph ----------------------------------------------------
    async fn insert_match_decision(&self, decision: MatchDecision) -> Result<()>;
    /// Look up a previously-recorded decision by id, e.g. to find the exact
    /// synonym a [`ReviewItem::originating_decision_id`] participated in
    /// (§4.J approve/reject).
    async fn get_match_decision(&self, id: &str) -> Result<Option<MatchDecision>>;

    // ---- Review queue -------------------------------------------------------
    async fn insert_review_item(&self, item: ReviewItem) -> Result<()>;
    async fn get_review_item(&self, id: &str) -> Result<ReviewItem>;
    async fn update_review_item(&self, item: ReviewItem) -> Result<()>;
    async fn list_pending_reviews(
        &self,
        offset: usize,
        limit: usize,
        filters: ReviewFilters,
    ) -> Result<Page<ReviewItem>>;
    async fn insert_review_decision(&self, decision: ReviewDecision) -> Result<()>;

    // ---- Audit + merge ledger (§4.K) ---------------------------------------
    async fn append_merge_record(&self, record: MergeRecord) -> Result<()>;
    async fn get_merge_records_for_target(&self, target_id: &str) -> Result<Vec<MergeRecord>>;
    /// Walk inbound `MERGED_INTO` edges recursively from `id` (cycle-free by
    /// the invariant in spec §3).
    async fn get_merge_chain(&self, id: &str) -> Result<Vec<MergeRecord>>;
    async fn append_audit_entry(&self, entry: AuditEntry) -> Result<()>;
    async fn query_audit(&self, query: AuditQuery) -> Result<Vec<AuditEntry>>;

    // ---- Distributed lock (§4.L) --------------------------------------------
    /// Attempt to take ownership of `key`. Succeeds if unheld, or if the
    /// current holder's lease has expired.
    async fn try_acquire_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool>;
    /// Release `key`, but only if `owner` currently holds it.
    async fn release_lock(&self, key: &str, owner: &str) -> Result<()>;
}

/// Adapts any [`GraphStore`] into a [`MergeTraversal`] for [`EntityReference`]
/// construction, so the reference handle doesn't need to depend on the full
/// store contract.
///
/// [`EntityReference`]: crate::reference::EntityReference
pub struct StoreTraversal<S: GraphStore + ?Sized> {
    store: std::sync::Arc<S>,
}

impl<S: GraphStore + ?Sized> StoreTraversal<S> {
    pub fn new(store: std::sync::Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: GraphStore + ?Sized> MergeTraversal for StoreTraversal<S> {
    async fn resolve_current_id(&self, original_id: &str) -> Result<String> {
        self.store.resolve_merged_into(original_id).await
    }
}
