//! LLM enrichment hook for the decision engine (§4.E `LLM_ENRICH`).
//!
//! The core does not depend on any particular LLM provider transport (out of
//! scope per spec §1); callers supply an implementation of [`LlmMatchJudge`].
//! Modeled on the cascading-dedup `LlmDedupJudge` pattern reviewed for this
//! spec and on the teacher's `ProviderInstance` trait
//! (`llmspell-providers::abstraction`).

use crate::error::Result;
use crate::types::Entity;
use async_trait::async_trait;

/// Asks an LLM whether two entity names denote the same real-world entity.
#[async_trait]
pub trait LlmMatchJudge: Send + Sync {
    /// Return a confidence in `[0, 1]` that `candidate` is the same
    /// real-world entity as `input_name`, or `None` if the judge declines to
    /// answer (e.g. rate-limited) — the caller treats that as
    /// `LLM_UNAVAILABLE` and proceeds without the signal.
    async fn judge_match(&self, input_name: &str, candidate: &Entity) -> Result<Option<f64>>;

    /// Provider name, for logging and `MatchDecision.evaluator` attribution.
    fn name(&self) -> &str {
        "llm"
    }
}

/// A judge that never answers; used when `use_llm` is disabled so the
/// decision engine can hold a judge unconditionally rather than branching on
/// `Option<Arc<dyn LlmMatchJudge>>` everywhere.
pub struct NoopLlmJudge;

#[async_trait]
impl LlmMatchJudge for NoopLlmJudge {
    async fn judge_match(&self, _input_name: &str, _candidate: &Entity) -> Result<Option<f64>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "noop"
    }
}
