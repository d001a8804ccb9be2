//! Core domain types for the entity resolution graph (spec §3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of an [`Entity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityStatus {
    /// The canonical, queryable representation of a real-world entity
    Active,
    /// Re-homed into another entity via a `MERGED_INTO` edge
    Merged,
}

/// A canonical node representing a real-world entity.
///
/// Invariants (spec §3): `(normalized_name, entity_type, tenant_id, status=ACTIVE)`
/// is unique; a MERGED entity has exactly one outgoing `MERGED_INTO` edge;
/// traversing `MERGED_INTO*` terminates at an ACTIVE node with no cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub canonical_name: String,
    pub normalized_name: String,
    pub entity_type: String,
    pub confidence_score: f64,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tenant_id: Option<String>,
    pub blocking_keys: Vec<String>,
}

impl Entity {
    /// Create a new ACTIVE entity with a fresh id and current timestamps.
    #[must_use]
    pub fn new(canonical_name: String, normalized_name: String, entity_type: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            canonical_name,
            normalized_name,
            entity_type,
            confidence_score: 1.0,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
            tenant_id: None,
            blocking_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_blocking_keys(mut self, keys: Vec<String>) -> Self {
        self.blocking_keys = keys;
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = confidence;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }
}

/// Provenance of a [`Synonym`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SynonymSource {
    System,
    Llm,
    Human,
}

/// An alternative name attached to exactly one [`Entity`] via `SYNONYM_OF`.
///
/// Invariant: `normalized_value` never equals the owning entity's
/// `normalized_name` after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synonym {
    pub id: String,
    pub value: String,
    pub normalized_value: String,
    pub source: SynonymSource,
    /// Base confidence, before decay/boost are applied at query time (§4.G)
    pub confidence: f64,
    pub last_confirmed_at: DateTime<Utc>,
    pub support_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Synonym {
    #[must_use]
    pub fn new(value: String, normalized_value: String, source: SynonymSource, confidence: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            value,
            normalized_value,
            source,
            confidence,
            last_confirmed_at: now,
            support_count: 1,
            created_at: now,
        }
    }
}

/// A by-product of merge, kept for provenance (spec §3, §4.F step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateEntity {
    pub id: String,
    pub original_name: String,
    pub normalized_name: String,
    pub source_system: String,
    pub created_at: DateTime<Utc>,
}

impl DuplicateEntity {
    #[must_use]
    pub fn new(original_name: String, normalized_name: String, source_system: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_name,
            normalized_name,
            source_system,
            created_at: Utc::now(),
        }
    }
}

/// A typed, library-managed edge between two ACTIVE entities at creation time.
///
/// After a merge of either endpoint, the edge is re-homed to the surviving
/// canonical entity (spec §3, §4.F step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryRelationship {
    pub id: String,
    pub from_entity: String,
    pub to_entity: String,
    pub relationship_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub props: HashMap<String, serde_json::Value>,
}

impl LibraryRelationship {
    #[must_use]
    pub fn new(
        from_entity: String,
        to_entity: String,
        relationship_type: String,
        created_by: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_entity,
            to_entity,
            relationship_type,
            created_at: Utc::now(),
            created_by,
            props: HashMap::new(),
        }
    }
}

/// Who evaluated a [`MatchDecision`] or made a [`ReviewDecision`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Evaluator {
    System,
    Llm,
    Human,
}

/// Outcome chosen by the decision engine (§4.E)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    AutoMerge,
    Synonym,
    Review,
    NoMatch,
    LlmEnrich,
}

/// A snapshot of the thresholds active when a [`MatchDecision`] was made, so
/// historical decisions remain explainable after config changes (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsSnapshot {
    pub auto_merge: f64,
    pub synonym: f64,
    pub review: f64,
}

/// An immutable record of one candidate comparison (§3, §4.E). One is emitted
/// per non-trivial candidate evaluated during a resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDecision {
    pub id: String,
    pub input_temp_id: String,
    pub candidate_id: String,
    pub entity_type: String,
    /// The input's normalized name at the time of this comparison, so a
    /// `ReviewItem` that originated from this decision can look up the exact
    /// synonym that participated (rather than guessing from all synonyms on
    /// the candidate entity) when the decision came from `SynonymLookup`.
    pub input_normalized_value: String,
    pub exact_score: f64,
    pub lev_score: f64,
    pub jw_score: f64,
    pub jaccard_score: f64,
    pub llm_score: Option<f64>,
    pub graph_context_score: Option<f64>,
    pub final_score: f64,
    pub outcome: MatchOutcome,
    pub thresholds_snapshot: ThresholdsSnapshot,
    pub evaluator: Evaluator,
    pub evaluated_at: DateTime<Utc>,
    /// Which candidate-discovery stage produced this comparison (§4.D); purely
    /// observational, does not change the outcome.
    pub discovery_stage: DiscoveryStage,
}

/// Which stage of candidate discovery (§4.D) produced a given comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryStage {
    ExactIndex,
    SynonymLookup,
    BlockingKeyScan,
    FullScanFallback,
}

/// Review status of a [`ReviewItem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// A candidate match awaiting human adjudication (§4.J)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub source_entity_id: String,
    pub candidate_entity_id: String,
    pub similarity_score: f64,
    pub entity_type: String,
    pub status: ReviewStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<String>,
    pub notes: Option<String>,
    /// The MatchDecision id this review originated from, so approve/reject can
    /// reinforce or penalize the synonym that participated in it (§4.J).
    pub originating_decision_id: Option<String>,
}

impl ReviewItem {
    #[must_use]
    pub fn new(
        source_entity_id: String,
        candidate_entity_id: String,
        similarity_score: f64,
        entity_type: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_entity_id,
            candidate_entity_id,
            similarity_score,
            entity_type,
            status: ReviewStatus::Pending,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewer_id: None,
            notes: None,
            originating_decision_id: None,
        }
    }
}

/// Action taken on a [`ReviewItem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// An immutable record of a human decision on a [`ReviewItem`] (§3, §4.J)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub id: String,
    pub review_id: String,
    pub action: ReviewAction,
    pub reviewer_id: String,
    pub rationale: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ReviewDecision {
    #[must_use]
    pub fn new(review_id: String, action: ReviewAction, reviewer_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            review_id,
            action,
            reviewer_id,
            rationale: None,
            decided_at: Utc::now(),
        }
    }
}

/// An append-only ledger entry recording one completed merge (§3, §4.K)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRecord {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub source_name: String,
    pub target_name: String,
    pub confidence: f64,
    pub decision: MatchOutcome,
    pub triggered_by: Evaluator,
    pub reasoning: String,
    pub merged_at: DateTime<Utc>,
}

impl MergeRecord {
    #[must_use]
    pub fn new(
        source_id: String,
        target_id: String,
        source_name: String,
        target_name: String,
        confidence: f64,
        decision: MatchOutcome,
        triggered_by: Evaluator,
        reasoning: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id,
            target_id,
            source_name,
            target_name,
            confidence,
            decision,
            triggered_by,
            reasoning,
            merged_at: Utc::now(),
        }
    }
}

/// An append-only audit trail entry, independent of the merge ledger (§4.K)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub entity_id: String,
    pub action: String,
    pub actor_id: String,
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(entity_id: String, action: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_id,
            action: action.into(),
            actor_id: actor_id.into(),
            details: serde_json::Value::Null,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
