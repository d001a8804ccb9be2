//! Synonym lifecycle and confidence decay/reinforcement (spec §4.G).

use chrono::Utc;
use resolver_core::types::Synonym;

/// `createForEntity` / reinforce dispatch: attach a new synonym, or
/// reinforce an existing one if `normalized_value` already points to the
/// same entity (spec §4.G first paragraph). Caller is responsible for the
/// existing-synonym lookup (`GraphStore::find_synonym_case_insensitive`);
/// this module only implements the pure reinforcement step.
pub fn reinforce(synonym: &mut Synonym) {
    synonym.support_count += 1;
    synonym.last_confirmed_at = Utc::now();
}

/// Effective confidence, computed lazily at query time — never stored
/// (spec §4.G): `clamp(base * decay + boost, 0, 1)` where `decay` is
/// exponential in days since last confirmation and `boost` is a
/// log-saturating function of support count.
#[must_use]
pub fn effective_confidence(synonym: &Synonym, decay_lambda: f64, reinforcement_cap: f64) -> f64 {
    let days = (Utc::now() - synonym.last_confirmed_at).num_milliseconds() as f64 / 86_400_000.0;
    let days = days.max(0.0);
    let decay = (-decay_lambda * days).exp();
    let boost = boost_for_support_count(synonym.support_count, reinforcement_cap);
    (synonym.confidence * decay + boost).clamp(0.0, 1.0)
}

/// `min(cap, k * log(1 + supportCount))`, with `k` calibrated so
/// `supportCount ≈ 50` saturates at `cap` (spec §4.G).
fn boost_for_support_count(support_count: u32, cap: f64) -> f64 {
    const CALIBRATION_SUPPORT_COUNT: f64 = 50.0;
    let k = cap / (1.0 + CALIBRATION_SUPPORT_COUNT).ln();
    (k * (1.0 + f64::from(support_count)).ln()).min(cap)
}

/// `true` iff decay has pushed the synonym below `synonym_threshold` even
/// though its un-decayed base confidence was originally usable (spec §4.G).
#[must_use]
pub fn should_trigger_review(synonym: &Synonym, decay_lambda: f64, reinforcement_cap: f64, synonym_threshold: f64) -> bool {
    let effective = effective_confidence(synonym, decay_lambda, reinforcement_cap);
    effective < synonym_threshold && synonym.confidence >= synonym_threshold
}

/// `true` iff effective confidence has decayed below the review threshold.
#[must_use]
pub fn is_stale(synonym: &Synonym, decay_lambda: f64, reinforcement_cap: f64, review_threshold: f64) -> bool {
    effective_confidence(synonym, decay_lambda, reinforcement_cap) < review_threshold
}

/// Negative reinforcement on review rejection (spec §4.G): shrink `base`
/// multiplicatively, bounded below by zero.
pub fn apply_negative_reinforcement(synonym: &mut Synonym, penalty: f64) {
    synonym.confidence = (synonym.confidence * (1.0 - penalty)).max(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver_core::types::SynonymSource;

    fn fresh_synonym(confidence: f64, support_count: u32) -> Synonym {
        let mut s = Synonym::new("Akme Corp".to_string(), "akme corp".to_string(), SynonymSource::System, confidence);
        s.support_count = support_count;
        s
    }

    #[test]
    fn fresh_synonym_effective_confidence_is_close_to_base_plus_initial_boost() {
        let synonym = fresh_synonym(0.85, 1);
        let effective = effective_confidence(&synonym, 0.001, 0.15);
        assert!(effective >= 0.85);
    }

    #[test]
    fn effective_confidence_is_monotonic_non_increasing_in_days_since_confirmed() {
        let mut synonym = fresh_synonym(0.85, 1);
        let now_effective = effective_confidence(&synonym, 0.001, 0.15);
        synonym.last_confirmed_at = Utc::now() - chrono::Duration::days(365);
        let later_effective = effective_confidence(&synonym, 0.001, 0.15);
        assert!(later_effective <= now_effective);
    }

    #[test]
    fn effective_confidence_is_monotonic_non_decreasing_in_support_count() {
        let low = fresh_synonym(0.85, 1);
        let high = fresh_synonym(0.85, 50);
        assert!(effective_confidence(&high, 0.001, 0.15) >= effective_confidence(&low, 0.001, 0.15));
    }

    #[test]
    fn boost_saturates_at_cap() {
        let maxed = fresh_synonym(0.0, 1_000_000);
        let effective = effective_confidence(&maxed, 0.001, 0.15);
        assert!(effective <= 0.15 + 1e-9);
    }

    #[test]
    fn reinforce_increments_support_count_and_resets_clock() {
        let mut synonym = fresh_synonym(0.85, 1);
        synonym.last_confirmed_at = Utc::now() - chrono::Duration::days(30);
        let before_count = synonym.support_count;
        reinforce(&mut synonym);
        assert_eq!(synonym.support_count, before_count + 1);
        assert!((Utc::now() - synonym.last_confirmed_at).num_seconds() < 2);
    }

    #[test]
    fn negative_reinforcement_shrinks_confidence_and_floors_at_zero() {
        let mut synonym = fresh_synonym(0.20, 1);
        apply_negative_reinforcement(&mut synonym, 0.25);
        assert!((synonym.confidence - 0.15).abs() < 1e-9);

        let mut near_zero = fresh_synonym(0.01, 1);
        apply_negative_reinforcement(&mut near_zero, 0.25);
        apply_negative_reinforcement(&mut near_zero, 0.25);
        apply_negative_reinforcement(&mut near_zero, 0.25);
        assert!(near_zero.confidence >= 0.0);
    }

    #[test]
    fn should_trigger_review_only_when_base_was_usable_but_has_decayed() {
        let mut decayed = fresh_synonym(0.85, 1);
        decayed.last_confirmed_at = Utc::now() - chrono::Duration::days(2000);
        assert!(should_trigger_review(&decayed, 0.001, 0.15, 0.80));

        let never_usable = fresh_synonym(0.50, 1);
        assert!(!should_trigger_review(&never_usable, 0.001, 0.15, 0.80));
    }
}
