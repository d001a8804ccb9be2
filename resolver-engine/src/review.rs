//! Human review queue (spec §4.J): submit, list, approve, reject.
//!
//! Approval triggers the merge engine (§4.F) with `evaluator=HUMAN`; rejection
//! applies negative reinforcement (§4.G) to any synonym the originating
//! decision touched. A review item can be decided exactly once.

use resolver_core::error::{CoreError, Result};
use resolver_core::events::{EventBus, ReviewDecided};
use resolver_core::store::{GraphStore, Page, ReviewFilters};
use resolver_core::types::{
    DiscoveryStage, Evaluator, MatchOutcome, ReviewAction, ReviewDecision, ReviewItem, ReviewStatus,
};
use std::sync::Arc;
use std::time::Duration;

use crate::lock::LockProvider;
use crate::merge::{self, MergeOutcome};
use crate::normalizer::Normalizer;
use crate::synonym;

/// The result of deciding a review item.
pub enum ReviewDecisionOutcome {
    /// Approval merged the source entity into the candidate.
    Approved(MergeOutcome),
    /// Rejection recorded the decision; no merge happened.
    Rejected,
}

pub struct ReviewQueue {
    store: Arc<dyn GraphStore>,
    lock_provider: Arc<dyn LockProvider>,
    event_bus: Arc<EventBus>,
    normalizer: Arc<Normalizer>,
    source_system: String,
    confidence_decay_lambda: f64,
    reinforcement_cap: f64,
    negative_reinforcement_penalty: f64,
    lock_timeout: Duration,
}

impl ReviewQueue {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn GraphStore>,
        lock_provider: Arc<dyn LockProvider>,
        event_bus: Arc<EventBus>,
        normalizer: Arc<Normalizer>,
        source_system: String,
        confidence_decay_lambda: f64,
        reinforcement_cap: f64,
        negative_reinforcement_penalty: f64,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            store,
            lock_provider,
            event_bus,
            normalizer,
            source_system,
            confidence_decay_lambda,
            reinforcement_cap,
            negative_reinforcement_penalty,
            lock_timeout,
        }
    }

    pub async fn submit(&self, item: ReviewItem) -> Result<String> {
        let id = item.id.clone();
        self.store.insert_review_item(item).await?;
        Ok(id)
    }

    pub async fn get_pending(&self, offset: usize, limit: usize, filters: ReviewFilters) -> Result<Page<ReviewItem>> {
        self.store.list_pending_reviews(offset, limit, filters).await
    }

    /// Approve a pending review item: mark it APPROVED, append the
    /// `ReviewDecision`, trigger a merge with `evaluator=HUMAN`, and reinforce
    /// whatever synonym the originating decision participated in.
    pub async fn approve(&self, review_id: &str, reviewer_id: &str, notes: Option<String>) -> Result<ReviewDecisionOutcome> {
        let mut item = self.store.get_review_item(review_id).await?;
        if item.status != ReviewStatus::Pending {
            return Err(CoreError::StateInvalid(format!("review item {review_id} was already decided")));
        }

        item.status = ReviewStatus::Approved;
        item.reviewed_at = Some(chrono::Utc::now());
        item.reviewer_id = Some(reviewer_id.to_string());
        item.notes.clone_from(&notes);
        self.store.update_review_item(item.clone()).await?;

        let mut decision = ReviewDecision::new(review_id.to_string(), ReviewAction::Approve, reviewer_id.to_string());
        decision.rationale = notes;
        self.store.insert_review_decision(decision).await?;

        self.reinforce_participating_synonym(&item).await;

        let outcome = merge::merge_entities(
            self.store.as_ref(),
            self.lock_provider.as_ref(),
            self.event_bus.as_ref(),
            &self.normalizer,
            &item.source_entity_id,
            &item.candidate_entity_id,
            MatchOutcome::Review,
            Evaluator::Human,
            "approved via review queue",
            &self.source_system,
            self.lock_timeout,
            3,
        )
        .await?;

        self.event_bus
            .emit_review_decided(ReviewDecided {
                review_id: review_id.to_string(),
                action: ReviewAction::Approve,
                reviewer_id: reviewer_id.to_string(),
            })
            .await;

        Ok(ReviewDecisionOutcome::Approved(outcome))
    }

    /// Reject a pending review item: mark it REJECTED, append the
    /// `ReviewDecision`, and apply negative reinforcement to the synonym the
    /// originating decision touched, if any.
    pub async fn reject(&self, review_id: &str, reviewer_id: &str, notes: Option<String>) -> Result<ReviewDecisionOutcome> {
        let mut item = self.store.get_review_item(review_id).await?;
        if item.status != ReviewStatus::Pending {
            return Err(CoreError::StateInvalid(format!("review item {review_id} was already decided")));
        }

        item.status = ReviewStatus::Rejected;
        item.reviewed_at = Some(chrono::Utc::now());
        item.reviewer_id = Some(reviewer_id.to_string());
        item.notes.clone_from(&notes);
        self.store.update_review_item(item.clone()).await?;

        let mut decision = ReviewDecision::new(review_id.to_string(), ReviewAction::Reject, reviewer_id.to_string());
        decision.rationale = notes;
        self.store.insert_review_decision(decision).await?;

        self.penalize_participating_synonym(&item).await;

        self.event_bus
            .emit_review_decided(ReviewDecided {
                review_id: review_id.to_string(),
                action: ReviewAction::Reject,
                reviewer_id: reviewer_id.to_string(),
            })
            .await;

        Ok(ReviewDecisionOutcome::Rejected)
    }

    /// Find the synonym `item`'s originating `MatchDecision` actually
    /// participated in: only a `SynonymLookup`-stage decision involved a
    /// synonym at all, and the one that participated is uniquely identified
    /// by `(candidate_entity_id, input_normalized_value)` — not merely "the
    /// most recently confirmed synonym on the candidate", which could be a
    /// different synonym than the one this decision scored (spec §4.J(d)).
    async fn find_participating_synonym(&self, item: &ReviewItem) -> Option<resolver_core::types::Synonym> {
        let decision_id = item.originating_decision_id.as_ref()?;
        let decision = match self.store.get_match_decision(decision_id).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                tracing::warn!(review_id = %item.id, decision_id = %decision_id, "originating match decision not found");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, review_id = %item.id, "failed to load originating match decision");
                return None;
            }
        };
        if decision.discovery_stage != DiscoveryStage::SynonymLookup {
            return None;
        }
        match self
            .store
            .find_synonym_case_insensitive(&item.candidate_entity_id, &decision.input_normalized_value)
            .await
        {
            Ok(synonym) => synonym,
            Err(e) => {
                tracing::warn!(error = %e, review_id = %item.id, "failed to look up participating synonym");
                None
            }
        }
    }

    async fn reinforce_participating_synonym(&self, item: &ReviewItem) {
        if let Some(mut synonym) = self.find_participating_synonym(item).await {
            synonym::reinforce(&mut synonym);
            if let Err(e) = self.store.update_synonym(synonym).await {
                tracing::warn!(error = %e, review_id = %item.id, "failed to reinforce synonym on review approval");
            }
        }
    }

    async fn penalize_participating_synonym(&self, item: &ReviewItem) {
        if let Some(mut synonym) = self.find_participating_synonym(item).await {
            synonym::apply_negative_reinforcement(&mut synonym, self.negative_reinforcement_penalty);
            if let Err(e) = self.store.update_synonym(synonym).await {
                tracing::warn!(error = %e, review_id = %item.id, "failed to penalize synonym on review rejection");
            }
        }
    }
}
