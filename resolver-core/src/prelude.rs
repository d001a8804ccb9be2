//! Convenience re-exports for downstream crates (`resolver-graph`,
//! `resolver-engine`) and for consumers embedding the resolver as a library.

pub use crate::config::{NormalizationRule, ResolutionOptions, ResolutionOptionsBuilder, SimilarityWeights, Thresholds};
pub use crate::error::{CoreError, Result};
pub use crate::events::{EventBus, MergeEvent, MergeListener, ReviewDecided, ReviewSubmitted};
pub use crate::llm::{LlmMatchJudge, NoopLlmJudge};
pub use crate::reference::{CanonicalKey, EntityReference, MergeTraversal};
pub use crate::store::{AuditQuery, GraphStore, Page, ReviewFilters, StoreTraversal};
pub use crate::types::{
    AuditEntry, DiscoveryStage, DuplicateEntity, Entity, EntityStatus, Evaluator,
    LibraryRelationship, MatchDecision, MatchOutcome, MergeRecord, ReviewAction, ReviewDecision,
    ReviewItem, ReviewStatus, Synonym, SynonymSource, ThresholdsSnapshot,
};
