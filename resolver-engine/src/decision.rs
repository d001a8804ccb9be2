//! Decision policy (spec §4.E): turn a candidate's composite score into an
//! outcome, optionally escalating through an LLM judge.

use resolver_core::config::{ResolutionOptions, Thresholds};
use resolver_core::llm::LlmMatchJudge;
use resolver_core::types::{Entity, Evaluator, MatchOutcome, ThresholdsSnapshot};

/// Floor below which LLM enrichment is not attempted even if `use_llm` is set
/// (spec §4.E: "LLM enabled and s ≥ 0.40").
const LLM_ENRICH_FLOOR: f64 = 0.40;

/// The result of deciding on one candidate comparison.
pub struct Decision {
    pub outcome: MatchOutcome,
    pub final_score: f64,
    /// Raw LLM judgment, present iff the LLM was consulted and answered.
    pub llm_score: Option<f64>,
    /// The blended score used to re-decide after LLM enrichment (spec §4.E
    /// "fold its score as graphContextScore").
    pub graph_context_score: Option<f64>,
    pub evaluator: Evaluator,
}

impl Decision {
    #[must_use]
    pub fn thresholds_snapshot(thresholds: &Thresholds) -> ThresholdsSnapshot {
        ThresholdsSnapshot {
            auto_merge: thresholds.auto_merge,
            synonym: thresholds.synonym,
            review: thresholds.review,
        }
    }
}

/// Apply the pure threshold ladder to a base score with no LLM involvement.
fn decide_by_thresholds(base_score: f64, thresholds: &Thresholds) -> MatchOutcome {
    if base_score >= thresholds.auto_merge {
        MatchOutcome::AutoMerge
    } else if base_score >= thresholds.synonym {
        MatchOutcome::Synonym
    } else if base_score >= thresholds.review {
        MatchOutcome::Review
    } else {
        MatchOutcome::NoMatch
    }
}

/// Blend the graph-side composite score with the LLM's independent
/// judgment. A flat average: the spec leaves the exact blend to the
/// implementer, fixing only the gate that an LLM-driven escalation to
/// AUTO_MERGE requires `llm_score >= llmConfidenceThreshold` (spec §9 open
/// question).
fn blend_scores(base_score: f64, llm_score: f64) -> f64 {
    ((base_score + llm_score) / 2.0).clamp(0.0, 1.0)
}

/// Decide the outcome for one candidate comparison, escalating to an LLM
/// judge when the base score falls in the enrichment band and
/// `options.use_llm` is set.
///
/// If the judge declines to answer (`Ok(None)`) or fails, resolution
/// proceeds without the LLM signal (spec §7 `LLM_UNAVAILABLE`): the decision
/// falls back to the non-LLM ladder.
pub async fn decide(
    input_name: &str,
    candidate: &Entity,
    base_score: f64,
    options: &ResolutionOptions,
    llm_judge: &dyn LlmMatchJudge,
) -> Decision {
    let thresholds = &options.thresholds;
    let non_llm_outcome = decide_by_thresholds(base_score, thresholds);

    if !matches!(non_llm_outcome, MatchOutcome::NoMatch) {
        return Decision {
            outcome: non_llm_outcome,
            final_score: base_score,
            llm_score: None,
            graph_context_score: None,
            evaluator: Evaluator::System,
        };
    }

    if !options.use_llm || base_score < LLM_ENRICH_FLOOR {
        return Decision {
            outcome: MatchOutcome::NoMatch,
            final_score: base_score,
            llm_score: None,
            graph_context_score: None,
            evaluator: Evaluator::System,
        };
    }

    match llm_judge.judge_match(input_name, candidate).await {
        Ok(Some(llm_score)) => {
            let blended = blend_scores(base_score, llm_score);
            let outcome = if blended >= thresholds.auto_merge {
                if llm_score >= options.llm_confidence_threshold {
                    MatchOutcome::AutoMerge
                } else {
                    // Blend crossed AUTO_MERGE but the LLM itself wasn't
                    // confident enough to authorize it (spec §9).
                    MatchOutcome::Synonym
                }
            } else if blended >= thresholds.synonym {
                MatchOutcome::Synonym
            } else if blended >= thresholds.review {
                MatchOutcome::Review
            } else {
                MatchOutcome::LlmEnrich
            };
            Decision {
                outcome,
                final_score: blended,
                llm_score: Some(llm_score),
                graph_context_score: Some(blended),
                evaluator: Evaluator::Llm,
            }
        }
        Ok(None) => {
            tracing::debug!(candidate_id = %candidate.id, "LLM judge declined to answer, proceeding without its signal");
            Decision {
                outcome: MatchOutcome::NoMatch,
                final_score: base_score,
                llm_score: None,
                graph_context_score: None,
                evaluator: Evaluator::System,
            }
        }
        Err(e) => {
            tracing::warn!(candidate_id = %candidate.id, error = %e, "LLM enrichment failed, proceeding without its signal");
            Decision {
                outcome: MatchOutcome::NoMatch,
                final_score: base_score,
                llm_score: None,
                graph_context_score: None,
                evaluator: Evaluator::System,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver_core::error::Result;
    use resolver_core::types::Entity;
    use async_trait::async_trait;

    fn candidate() -> Entity {
        Entity::new("Acme Corp".to_string(), "acme".to_string(), "COMPANY".to_string())
    }

    struct FixedJudge(Option<f64>);

    #[async_trait]
    impl LlmMatchJudge for FixedJudge {
        async fn judge_match(&self, _input_name: &str, _candidate: &Entity) -> Result<Option<f64>> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn score_at_auto_merge_threshold_is_inclusive() {
        let options = ResolutionOptions::default();
        let judge = FixedJudge(None);
        let decision = decide("Acme", &candidate(), options.thresholds.auto_merge, &options, &judge).await;
        assert!(matches!(decision.outcome, MatchOutcome::AutoMerge));
    }

    #[tokio::test]
    async fn score_at_review_threshold_is_review() {
        let options = ResolutionOptions::default();
        let judge = FixedJudge(None);
        let decision = decide("Acme", &candidate(), options.thresholds.review, &options, &judge).await;
        assert!(matches!(decision.outcome, MatchOutcome::Review));
    }

    #[tokio::test]
    async fn below_review_without_llm_is_no_match() {
        let options = ResolutionOptions::default();
        let judge = FixedJudge(None);
        let decision = decide("Acme", &candidate(), 0.50, &options, &judge).await;
        assert!(matches!(decision.outcome, MatchOutcome::NoMatch));
        assert_eq!(decision.evaluator, Evaluator::System);
    }

    #[tokio::test]
    async fn llm_confident_enough_can_escalate_to_auto_merge() {
        let mut options = ResolutionOptions::default();
        options.use_llm = true;
        options.llm_confidence_threshold = 0.75;
        let judge = FixedJudge(Some(0.99));
        // base_score 0.50 blended with 0.99 -> 0.745, below default auto_merge (0.92);
        // use thresholds that make the blend reach auto_merge for this test.
        options.thresholds.auto_merge = 0.70;
        let decision = decide("Acme", &candidate(), 0.50, &options, &judge).await;
        assert!(matches!(decision.outcome, MatchOutcome::AutoMerge));
        assert_eq!(decision.evaluator, Evaluator::Llm);
    }

    #[tokio::test]
    async fn llm_not_confident_enough_is_capped_below_auto_merge() {
        let mut options = ResolutionOptions::default();
        options.use_llm = true;
        options.llm_confidence_threshold = 0.90;
        options.thresholds.auto_merge = 0.70;
        let judge = FixedJudge(Some(0.80));
        let decision = decide("Acme", &candidate(), 0.50, &options, &judge).await;
        assert!(!matches!(decision.outcome, MatchOutcome::AutoMerge));
    }

    #[tokio::test]
    async fn llm_declining_to_answer_falls_back_to_no_match() {
        let mut options = ResolutionOptions::default();
        options.use_llm = true;
        let judge = FixedJudge(None);
        let decision = decide("Acme", &candidate(), 0.50, &options, &judge).await;
        assert!(matches!(decision.outcome, MatchOutcome::NoMatch));
        assert!(decision.llm_score.is_none());
    }
}
