//! Ordered, type-scoped rewrite rules that turn a raw name into a comparable
//! normalized string (spec §4.A).
//!
//! Rules are compiled once at construction (spec §9 design notes: "compile
//! once at construction; forbid runtime rule mutation on hot paths"),
//! following the teacher's `LazyLock`-compiled-regex convention used
//! throughout the extraction pipeline (`llmspell-graph::extraction`).

use regex::Regex;
use resolver_core::config::NormalizationRule;
use resolver_core::error::{CoreError, Result};
use std::sync::LazyLock;

struct CompiledRule {
    #[allow(dead_code)]
    name: String,
    regex: Regex,
    replacement: String,
    applicable_types: Vec<String>,
}

/// Applies the default rule set plus any override supplied via
/// `ResolutionOptions::normalization_rules`.
pub struct Normalizer {
    rules: Vec<CompiledRule>,
}

impl Normalizer {
    /// Compile a custom rule set. Rules are sorted ascending by priority
    /// before compilation order is fixed.
    pub fn new(mut rules: Vec<NormalizationRule>) -> Result<Self> {
        rules.sort_by_key(|r| r.priority);
        let compiled = rules
            .into_iter()
            .map(|r| {
                Regex::new(&r.pattern)
                    .map(|regex| CompiledRule {
                        name: r.name,
                        regex,
                        replacement: r.replacement,
                        applicable_types: r.applicable_types,
                    })
                    .map_err(|e| CoreError::Configuration(format!("invalid normalization pattern '{}': {e}", r.pattern)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules: compiled })
    }

    /// The built-in rule set (spec §4.A): company suffixes, honorifics,
    /// ampersand elision, special-character stripping, and metadata rules.
    /// Built from literal patterns, so compilation cannot fail.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(default_rules()).expect("default normalization rules are known-valid at compile time")
    }

    /// Normalize `input` for `entity_type` (spec §4.A steps 1-4).
    ///
    /// Runs the rule pipeline to a fixed point rather than once: a chained
    /// suffix like "Apple Inc Ltd" needs the suffix rule to fire twice (each
    /// pass only strips the single suffix token anchored at the end), and
    /// `normalize` must satisfy `normalize(normalize(x)) == normalize(x)`
    /// (spec §8) regardless of how many suffix tokens an input carries.
    #[must_use]
    pub fn normalize(&self, input: &str, entity_type: &str) -> String {
        let mut text = self.apply_rules_once(&input.to_lowercase(), entity_type);
        for _ in 0..MAX_NORMALIZATION_PASSES {
            let next = self.apply_rules_once(&text, entity_type);
            if next == text {
                break;
            }
            text = next;
        }
        if text.is_empty() {
            return input.to_lowercase().trim().to_string();
        }
        text
    }

    fn apply_rules_once(&self, input: &str, entity_type: &str) -> String {
        let mut text = input.to_string();
        for rule in &self.rules {
            if !rule.applicable_types.is_empty() && !rule.applicable_types.iter().any(|t| t == entity_type) {
                continue;
            }
            text = rule.regex.replace_all(&text, rule.replacement.as_str()).into_owned();
        }
        WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
    }
}

/// Bound on fixed-point iterations, so a pathological rule set (or a custom
/// one supplied via `ResolutionOptions`) can't loop forever chasing a fixed
/// point that never stabilizes.
const MAX_NORMALIZATION_PASSES: u32 = 8;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

fn default_rules() -> Vec<NormalizationRule> {
    vec![
        // Metadata rules run first so suffix rules don't have to account for
        // trailing version/date/env noise.
        NormalizationRule::new("strip_version_suffix", r"_v\d+\b", "", 5),
        NormalizationRule::new("strip_date_suffix", r"_\d{4}\b", "", 5),
        NormalizationRule::new("strip_env_suffix", r"-(?:prod|dev|staging|test|uat)\b", "", 5),
        NormalizationRule::new("strip_schema_prefix", r"^(?:dbo|public)\.", "", 5),
        // Company legal-form suffixes.
        NormalizationRule::new(
            "company_suffix",
            r"\b(?:incorporated|inc|corporation|corp|limited|ltd|gmbh|ag|bv|nv|plc|llc|sa|co)\.?\s*$",
            "",
            10,
        )
        .for_types(vec!["COMPANY".to_string()]),
        // Honorifics on person names.
        NormalizationRule::new("honorific_prefix", r"^(?:mr|mrs|ms|dr|prof|sir|dame)\.?\s+", "", 10)
            .for_types(vec!["PERSON".to_string()]),
        // Ampersand / "and" elision.
        NormalizationRule::new("ampersand_elision", r"\s*&\s*", " and ", 20),
        NormalizationRule::new("and_elision", r"\band\b", "", 25),
        // Strip all remaining non-alphanumeric characters; must run after the
        // rules above so they can still match on punctuation/whitespace.
        NormalizationRule::new("strip_special_chars", r"[^a-z0-9\s]", "", 100),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        let n = Normalizer::with_defaults();
        assert_eq!(n.normalize("  Acme Corp  ", "COMPANY"), "acme");
    }

    #[test]
    fn strips_company_suffix_variants() {
        let n = Normalizer::with_defaults();
        assert_eq!(n.normalize("Apple Inc.", "COMPANY"), "apple");
        assert_eq!(n.normalize("Apple Incorporated", "COMPANY"), "apple");
    }

    #[test]
    fn suffix_rules_are_type_scoped() {
        let n = Normalizer::with_defaults();
        // "Ltd" is a company suffix; should not be stripped for PERSON.
        assert_eq!(n.normalize("Ltd", "PERSON"), "ltd");
    }

    #[test]
    fn strips_honorific_for_person() {
        let n = Normalizer::with_defaults();
        assert_eq!(n.normalize("Dr. Jane Smith", "PERSON"), "jane smith");
    }

    #[test]
    fn elides_ampersand_and_and() {
        let n = Normalizer::with_defaults();
        assert_eq!(n.normalize("Procter & Gamble", "COMPANY"), "procter gamble");
        assert_eq!(n.normalize("Johnson and Johnson", "COMPANY"), "johnson johnson");
    }

    #[test]
    fn is_idempotent() {
        let n = Normalizer::with_defaults();
        let once = n.normalize("International Business Machines Corp.", "COMPANY");
        let twice = n.normalize(&once, "COMPANY");
        assert_eq!(once, twice);
    }

    #[test]
    fn chained_suffixes_are_fully_stripped_in_one_call() {
        let n = Normalizer::with_defaults();
        // The suffix rule is anchored at end-of-string, so it only removes
        // one trailing suffix token per pass; normalize must iterate until
        // the whole chain is gone rather than leaving "apple inc" behind.
        assert_eq!(n.normalize("Apple Inc Ltd", "COMPANY"), "apple");
    }

    #[test]
    fn empty_after_normalization_falls_back_to_lowercase_trim() {
        let n = Normalizer::new(vec![NormalizationRule::new("strip_all", r".*", "", 1)]).unwrap();
        assert_eq!(n.normalize("  Anything  ", "COMPANY"), "anything");
    }

    #[test]
    fn metadata_rules_strip_version_and_env_noise() {
        let n = Normalizer::with_defaults();
        assert_eq!(n.normalize("customers_v2", "TABLE"), "customers");
        assert_eq!(n.normalize("orders-prod", "TABLE"), "orders");
        assert_eq!(n.normalize("dbo.customers", "TABLE"), "customers");
    }
}
