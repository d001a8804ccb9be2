//! In-process events emitted by the core (spec §6). No wire format is
//! mandated; listeners subscribe directly via [`MergeListener`], following
//! the teacher's explicit-subscription `EventHandler` pattern
//! (`llmspell-events::handler`) rather than a global dispatch registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ReviewAction;

/// Fired after step 7 of the merge engine (§4.F) completes successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEvent {
    pub source_id: String,
    pub target_id: String,
    pub at: DateTime<Utc>,
}

/// Fired when a candidate is enqueued to the review queue (§4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSubmitted {
    pub review_id: String,
    pub source_id: String,
    pub candidate_id: String,
    pub score: f64,
}

/// Fired when a human reviewer approves or rejects a review item (§4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecided {
    pub review_id: String,
    pub action: ReviewAction,
    pub reviewer_id: String,
}

/// A subscriber to merge-lifecycle events. The resolution cache (§4.M) and
/// any metrics adapter implement this; the resolver is constructed with a
/// list of listeners rather than reaching for global state (spec.md §9).
#[async_trait]
pub trait MergeListener: Send + Sync {
    async fn on_merge(&self, _event: &MergeEvent) {}
    async fn on_review_submitted(&self, _event: &ReviewSubmitted) {}
    async fn on_review_decided(&self, _event: &ReviewDecided) {}

    /// Listener name, for debugging and log correlation.
    fn name(&self) -> &str {
        "anonymous_listener"
    }
}

/// Fan-out dispatcher over a set of [`MergeListener`]s.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<std::sync::Arc<dyn MergeListener>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: std::sync::Arc<dyn MergeListener>) {
        self.listeners.push(listener);
    }

    pub async fn emit_merge(&self, event: MergeEvent) {
        for listener in &self.listeners {
            listener.on_merge(&event).await;
        }
    }

    pub async fn emit_review_submitted(&self, event: ReviewSubmitted) {
        for listener in &self.listeners {
            listener.on_review_submitted(&event).await;
        }
    }

    pub async fn emit_review_decided(&self, event: ReviewDecided) {
        for listener in &self.listeners {
            listener.on_review_decided(&event).await;
        }
    }
}
