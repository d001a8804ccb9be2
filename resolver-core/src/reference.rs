//! Merge-stable opaque entity handle (spec §3 `EntityReference`, §4.H)
//!
//! The source language expresses this as a closure captured at construction
//! time. In Rust we express the closure as a small trait object (per the
//! design notes in spec.md §9) rather than exposing the underlying id field
//! directly — callers can only reach the canonical id through
//! [`EntityReference::current_id`].

use crate::error::Result;
use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Performs the `MERGED_INTO*` traversal from an original entity id to its
/// current canonical id. Implemented by the merge engine / graph store; kept
/// as a narrow trait so `EntityReference` does not depend on the whole
/// `GraphStore` contract.
#[async_trait]
pub trait MergeTraversal: Send + Sync {
    /// Follow `MERGED_INTO*` from `original_id`, returning the terminal
    /// ACTIVE entity id (or `original_id` itself if already canonical).
    async fn resolve_current_id(&self, original_id: &str) -> Result<String>;
}

/// A merge-stable reference to a real-world entity.
///
/// Holding one before a merge still equates to a post-merge reference
/// pointing at the same real entity once both are resolved, because equality
/// is defined over the *current* canonical id, never the id captured at
/// construction time.
#[derive(Clone)]
pub struct EntityReference {
    original_id: String,
    entity_type: String,
    traversal: Arc<dyn MergeTraversal>,
}

impl EntityReference {
    #[must_use]
    pub fn new(original_id: String, entity_type: String, traversal: Arc<dyn MergeTraversal>) -> Self {
        Self {
            original_id,
            entity_type,
            traversal,
        }
    }

    /// The id this reference was created with. Not necessarily canonical.
    #[must_use]
    pub fn original_id(&self) -> &str {
        &self.original_id
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Resolve the current canonical id by following `MERGED_INTO*`.
    pub async fn current_id(&self) -> Result<String> {
        self.traversal.resolve_current_id(&self.original_id).await
    }

    /// `true` iff the entity this reference was created for has since been
    /// merged into another canonical entity.
    pub async fn was_merged(&self) -> Result<bool> {
        Ok(self.current_id().await? != self.original_id)
    }

    /// A hashable/comparable snapshot of "what this reference currently
    /// points at", suitable for use as a map key or equality check. Equality
    /// and hashing of references happen through this snapshot rather than
    /// through `PartialEq`/`Hash` directly, since resolving the current id
    /// requires a (possibly I/O-bound) traversal.
    pub async fn canonical_key(&self) -> Result<CanonicalKey> {
        Ok(CanonicalKey {
            current_id: self.current_id().await?,
            entity_type: self.entity_type.clone(),
        })
    }
}

/// Equality/hash key for an [`EntityReference`]: current canonical id + type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalKey {
    pub current_id: String,
    pub entity_type: String,
}

impl Hash for CanonicalKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.current_id.hash(state);
        self.entity_type.hash(state);
    }
}
