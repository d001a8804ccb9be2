//! The resolver facade (spec §9 "sync core is authoritative; an async
//! facade wraps each sync op in a task"). Since the whole engine is written
//! against `async_trait` throughout, the core itself is async; nothing here
//! suspends without a timeout (spec §5).
//!
//! Ties together normalization (§4.A), blocking (§4.B), scoring (§4.C),
//! candidate discovery (§4.D), the decision engine (§4.E), the merge engine
//! (§4.F), the synonym store (§4.G), and the resolution cache (§4.M).

use resolver_core::config::ResolutionOptions;
use resolver_core::error::{CoreError, Result};
use resolver_core::events::EventBus;
use resolver_core::llm::LlmMatchJudge;
use resolver_core::reference::EntityReference;
use resolver_core::store::{GraphStore, StoreTraversal};
use resolver_core::types::{
    AuditEntry, DiscoveryStage, Entity, Evaluator, MatchDecision, MatchOutcome, ReviewItem,
    Synonym, SynonymSource,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::blocking::blocking_keys;
use crate::cache::{CachedResolution, ResolutionCache};
use crate::decision::{self, Decision};
use crate::lock::{self, LockProvider};
use crate::merge::{self, MergeOutcome};
use crate::normalizer::Normalizer;
use crate::similarity;
use crate::synonym;

const MAX_NAME_LENGTH: usize = 512;

/// Outcome of one `resolve` call (spec §2 data flow).
pub struct ResolveOutcome {
    pub entity_reference: EntityReference,
    pub is_new_entity: bool,
    pub match_confidence: f64,
    pub outcome: MatchOutcome,
}

pub struct Resolver {
    store: Arc<dyn GraphStore>,
    options: ResolutionOptions,
    normalizer: Normalizer,
    lock_provider: Arc<dyn LockProvider>,
    event_bus: Arc<EventBus>,
    cache: Arc<ResolutionCache>,
    llm_judge: Arc<dyn LlmMatchJudge>,
}

impl Resolver {
    #[must_use]
    pub fn new(
        store: Arc<dyn GraphStore>,
        options: ResolutionOptions,
        lock_provider: Arc<dyn LockProvider>,
        event_bus: Arc<EventBus>,
        cache: Arc<ResolutionCache>,
        llm_judge: Arc<dyn LlmMatchJudge>,
    ) -> Self {
        let normalizer = match &options.normalization_rules {
            Some(rules) => Normalizer::new(rules.clone()).unwrap_or_else(|_| Normalizer::with_defaults()),
            None => Normalizer::with_defaults(),
        };
        Self {
            store,
            options,
            normalizer,
            lock_provider,
            event_bus,
            cache,
            llm_judge,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ResolutionOptions {
        &self.options
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    fn validate_input(name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InputInvalid("name is blank".to_string()));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(CoreError::InputInvalid(format!("name exceeds {MAX_NAME_LENGTH} bytes")));
        }
        if name.chars().any(|c| c.is_control() && c != '\t') {
            return Err(CoreError::InputInvalid("name contains control characters".to_string()));
        }
        Ok(())
    }

    fn reference_for(&self, entity_id: String, entity_type: String) -> EntityReference {
        EntityReference::new(entity_id, entity_type, Arc::new(StoreTraversal::new(self.store.clone())))
    }

    /// Resolve `(canonical_name, entity_type)` against the graph (spec §2
    /// data flow, §4.D, §4.E). Never creates a duplicate ACTIVE entity for
    /// the same `(normalizedName, type, tenant)` tuple under concurrent
    /// callers: create-if-absent is serialized by the entity-resolution
    /// lock (spec §4.L).
    pub async fn resolve(&self, canonical_name: &str, entity_type: &str, tenant_id: Option<&str>) -> Result<ResolveOutcome> {
        Self::validate_input(canonical_name)?;
        let normalized = self.normalizer.normalize(canonical_name, entity_type);
        if normalized.is_empty() {
            return Err(CoreError::InputInvalid("name is empty after normalization".to_string()));
        }

        if self.options.caching_enabled {
            if let Some(cached) = self.cache.get(&normalized, entity_type) {
                return Ok(ResolveOutcome {
                    entity_reference: self.reference_for(cached.entity_id, entity_type.to_string()),
                    is_new_entity: false,
                    match_confidence: cached.confidence,
                    outcome: MatchOutcome::AutoMerge,
                });
            }
        }

        let lock_key = lock::entity_resolution_key(&normalized, entity_type);
        lock::acquire_with_retry(
            self.lock_provider.as_ref(),
            &lock_key,
            "resolver",
            Duration::from_millis(self.options.lock_timeout_ms),
            3,
        )
        .await?;

        let result = self.resolve_locked(canonical_name, &normalized, entity_type, tenant_id).await;

        let _ = self.lock_provider.unlock(&lock_key, "resolver").await;
        result
    }

    async fn resolve_locked(
        &self,
        canonical_name: &str,
        normalized: &str,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<ResolveOutcome> {
        // Stage 1: exact index lookup bypasses scoring entirely (spec §4.D).
        if let Some(existing) = self.store.find_active_by_normalized_name(normalized, entity_type, tenant_id).await? {
            self.cache_put(normalized, entity_type, &existing.id, 1.0);
            return Ok(ResolveOutcome {
                entity_reference: self.reference_for(existing.id, entity_type.to_string()),
                is_new_entity: false,
                match_confidence: 1.0,
                outcome: MatchOutcome::AutoMerge,
            });
        }

        let input_temp_id = Uuid::new_v4().to_string();

        // Stage 2: synonym lookup.
        if let Some((owner_synonym, owner)) = self.store.find_synonym_owner(normalized, entity_type, tenant_id).await? {
            let effective = synonym::effective_confidence(&owner_synonym, self.options.confidence_decay_lambda, self.options.reinforcement_cap);
            let mut reinforced = owner_synonym.clone();
            synonym::reinforce(&mut reinforced);
            self.store.update_synonym(reinforced).await?;

            let decision = decision::decide(canonical_name, &owner, effective, &self.options, self.llm_judge.as_ref()).await;
            let decision_id = self.record_decision(&input_temp_id, &owner, normalized, &decision, DiscoveryStage::SynonymLookup).await?;
            // The synonym was already reinforced above (spec §4.D step 2:
            // "also reinforce that synonym", unconditional on the decision
            // outcome that follows) -- `apply_decision` must not reinforce
            // it again if the outcome also happens to land on SYNONYM.
            return self
                .apply_decision(canonical_name, normalized, entity_type, tenant_id, &input_temp_id, &decision_id, &owner, &decision, true)
                .await;
        }

        // Stage 3: blocking-key scan.
        let keys = blocking_keys(normalized);
        let blocked = self.store.find_active_by_blocking_keys(&keys, entity_type, tenant_id).await?;
        let mut best = self
            .score_and_record(canonical_name, normalized, &blocked, &input_temp_id, DiscoveryStage::BlockingKeyScan)
            .await?;

        // Stage 4: full-scan fallback, only if blocking found nothing and
        // the corpus is below the configured size limit.
        if best.is_none() && blocked.is_empty() {
            let count = self.store.count_active_by_type(entity_type, tenant_id).await?;
            if count > 0 && count <= self.options.full_scan_size_limit {
                let all = self.store.scan_active_by_type(entity_type, tenant_id).await?;
                best = self
                    .score_and_record(canonical_name, normalized, &all, &input_temp_id, DiscoveryStage::FullScanFallback)
                    .await?;
            }
        }

        match best {
            Some((candidate, decision, decision_id)) => {
                self.apply_decision(
                    canonical_name,
                    normalized,
                    entity_type,
                    tenant_id,
                    &input_temp_id,
                    &decision_id,
                    &candidate,
                    &decision,
                    false,
                )
                .await
            }
            None => self.create_new_entity(canonical_name, normalized, entity_type, tenant_id).await,
        }
    }

    /// Score every candidate in `pool` against the input, emit one
    /// `MatchDecision` per non-trivial comparison (spec §4.E), and return
    /// the best-scoring candidate with its own decision. Ties resolve by
    /// higher `confidenceScore`, then older `createdAt` (spec §4.C).
    async fn score_and_record(
        &self,
        canonical_name: &str,
        normalized: &str,
        pool: &[Entity],
        input_temp_id: &str,
        stage: DiscoveryStage,
    ) -> Result<Option<(Entity, Decision, String)>> {
        let mut best: Option<(Entity, Decision, String)> = None;

        for candidate in pool {
            let base_score = similarity::score(normalized, &candidate.normalized_name, &self.options.similarity_weights);
            if stage != DiscoveryStage::FullScanFallback && base_score < self.options.thresholds.review {
                // Candidates below review threshold on the blocking-scan
                // path are not "kept" per spec §4.D step 3, and scoring
                // exceptions aside, we don't burn a MatchDecision on them.
                continue;
            }
            let decision = decision::decide(canonical_name, candidate, base_score, &self.options, self.llm_judge.as_ref()).await;
            let decision_id = self.record_decision(input_temp_id, candidate, normalized, &decision, stage).await?;

            let replace = match &best {
                None => true,
                Some((current_best, current_decision, _)) => {
                    is_better(decision.final_score, candidate, current_decision.final_score, current_best)
                }
            };
            if replace {
                best = Some((candidate.clone(), decision, decision_id));
            }
        }

        Ok(best)
    }

    async fn record_decision(
        &self,
        input_temp_id: &str,
        candidate: &Entity,
        normalized: &str,
        decision: &Decision,
        stage: DiscoveryStage,
    ) -> Result<String> {
        let lev = similarity::levenshtein_ratio(normalized, &candidate.normalized_name);
        let jw = strsim::jaro_winkler(normalized, &candidate.normalized_name);
        let jaccard = similarity::token_jaccard(normalized, &candidate.normalized_name);
        let exact = if normalized == candidate.normalized_name { 1.0 } else { 0.0 };

        let decision_id = Uuid::new_v4().to_string();
        let record = MatchDecision {
            id: decision_id.clone(),
            input_temp_id: input_temp_id.to_string(),
            candidate_id: candidate.id.clone(),
            entity_type: candidate.entity_type.clone(),
            input_normalized_value: normalized.to_string(),
            exact_score: exact,
            lev_score: lev,
            jw_score: jw,
            jaccard_score: jaccard,
            llm_score: decision.llm_score,
            graph_context_score: decision.graph_context_score,
            final_score: decision.final_score,
            outcome: decision.outcome,
            thresholds_snapshot: Decision::thresholds_snapshot(&self.options.thresholds),
            evaluator: decision.evaluator,
            evaluated_at: chrono::Utc::now(),
            discovery_stage: stage,
        };
        if let Err(e) = self.store.insert_match_decision(record).await {
            tracing::warn!(error = %e, "failed to persist match decision, continuing sweep");
        }
        Ok(decision_id)
    }

    /// `synonym_already_reinforced` is true when the caller is the stage-2
    /// synonym-lookup path, which reinforces the matched synonym once before
    /// deciding (spec §4.D step 2) regardless of what outcome `decide`
    /// produces; in that case a SYNONYM outcome here must not reinforce it a
    /// second time.
    #[allow(clippy::too_many_arguments)]
    async fn apply_decision(
        &self,
        canonical_name: &str,
        normalized: &str,
        entity_type: &str,
        tenant_id: Option<&str>,
        input_temp_id: &str,
        decision_id: &str,
        candidate: &Entity,
        decision: &Decision,
        synonym_already_reinforced: bool,
    ) -> Result<ResolveOutcome> {
        match decision.outcome {
            MatchOutcome::AutoMerge => {
                self.cache_put(normalized, entity_type, &candidate.id, decision.final_score);
                Ok(ResolveOutcome {
                    entity_reference: self.reference_for(candidate.id.clone(), entity_type.to_string()),
                    is_new_entity: false,
                    match_confidence: decision.final_score,
                    outcome: MatchOutcome::AutoMerge,
                })
            }
            MatchOutcome::Synonym => {
                if !synonym_already_reinforced {
                    self.attach_or_reinforce_synonym(canonical_name, normalized, &candidate.id, decision.final_score).await?;
                }
                self.cache_put(normalized, entity_type, &candidate.id, decision.final_score);
                Ok(ResolveOutcome {
                    entity_reference: self.reference_for(candidate.id.clone(), entity_type.to_string()),
                    is_new_entity: false,
                    match_confidence: decision.final_score,
                    outcome: MatchOutcome::Synonym,
                })
            }
            MatchOutcome::Review => {
                let mut review = ReviewItem::new(input_temp_id.to_string(), candidate.id.clone(), decision.final_score, entity_type.to_string());
                review.originating_decision_id = Some(decision_id.to_string());
                let review_id = review.id.clone();
                self.store.insert_review_item(review).await?;
                self.event_bus
                    .emit_review_submitted(resolver_core::events::ReviewSubmitted {
                        review_id,
                        source_id: input_temp_id.to_string(),
                        candidate_id: candidate.id.clone(),
                        score: decision.final_score,
                    })
                    .await;
                Ok(ResolveOutcome {
                    entity_reference: self.reference_for(candidate.id.clone(), entity_type.to_string()),
                    is_new_entity: false,
                    match_confidence: decision.final_score,
                    outcome: MatchOutcome::Review,
                })
            }
            MatchOutcome::NoMatch | MatchOutcome::LlmEnrich => self.create_new_entity(canonical_name, normalized, entity_type, tenant_id).await,
        }
    }

    /// Attach `canonical_name` to `entity_id` as a synonym, reinforcing
    /// instead if an equivalent synonym is already attached. Exposed at
    /// `pub(crate)` so [`crate::batch::BatchContext`] can turn a later
    /// equivalent folded during `enqueue` into a synonym of the entry its
    /// normalized name was folded into (spec §4.I: "order of enqueue
    /// determines which input wins canonicalName; later equivalents become
    /// synonyms").
    pub(crate) async fn attach_or_reinforce_synonym(&self, canonical_name: &str, normalized: &str, entity_id: &str, confidence: f64) -> Result<()> {
        if let Some(mut existing) = self.store.find_synonym_case_insensitive(entity_id, normalized).await? {
            synonym::reinforce(&mut existing);
            self.store.update_synonym(existing).await
        } else {
            let syn = Synonym::new(canonical_name.to_string(), normalized.to_string(), SynonymSource::System, confidence);
            self.store.insert_synonym(entity_id, syn).await
        }
    }

    async fn create_new_entity(&self, canonical_name: &str, normalized: &str, entity_type: &str, tenant_id: Option<&str>) -> Result<ResolveOutcome> {
        let keys = blocking_keys(normalized);
        let mut entity = Entity::new(canonical_name.to_string(), normalized.to_string(), entity_type.to_string()).with_blocking_keys(keys);
        if let Some(tenant) = tenant_id {
            entity = entity.with_tenant(tenant);
        }
        let entity_id = entity.id.clone();
        self.store.insert_entity(entity).await?;
        self.store
            .append_audit_entry(AuditEntry::new(entity_id.clone(), "ENTITY_CREATED", self.options.source_system.clone()))
            .await?;
        self.cache_put(normalized, entity_type, &entity_id, 1.0);
        Ok(ResolveOutcome {
            entity_reference: self.reference_for(entity_id, entity_type.to_string()),
            is_new_entity: true,
            match_confidence: 1.0,
            outcome: MatchOutcome::NoMatch,
        })
    }

    fn cache_put(&self, normalized: &str, entity_type: &str, entity_id: &str, confidence: f64) {
        if self.options.caching_enabled {
            self.cache.put(
                normalized,
                entity_type,
                CachedResolution {
                    entity_id: entity_id.to_string(),
                    confidence,
                },
            );
        }
    }

    /// Merge two already-canonical entities (spec §4.F), e.g. from a
    /// review approval or an explicit dedup-of-existing-entities call.
    /// Distinct from the implicit AUTO_MERGE a `resolve` call can produce,
    /// which never materializes the input as its own node and so never
    /// invokes this engine (spec §8 scenario 3).
    pub async fn merge(&self, source_id: &str, target_id: &str, triggered_by: Evaluator, reasoning: &str) -> Result<MergeOutcome> {
        merge::merge_entities(
            self.store.as_ref(),
            self.lock_provider.as_ref(),
            self.event_bus.as_ref(),
            &self.normalizer,
            source_id,
            target_id,
            MatchOutcome::AutoMerge,
            triggered_by,
            reasoning,
            &self.options.source_system,
            Duration::from_millis(self.options.lock_timeout_ms),
            3,
        )
        .await
    }
}

/// Tie-break per spec §4.C: higher score wins; ties resolve by higher
/// `confidenceScore`, then older `createdAt`.
fn is_better(candidate_score: f64, candidate: &Entity, best_score: f64, best: &Entity) -> bool {
    if (candidate_score - best_score).abs() > f64::EPSILON {
        return candidate_score > best_score;
    }
    if (candidate.confidence_score - best.confidence_score).abs() > f64::EPSILON {
        return candidate.confidence_score > best.confidence_score;
    }
    candidate.created_at < best.created_at
}
