//! Resolution configuration (spec §6 "Resolution options").
//!
//! Follows the teacher's configuration style
//! (`llmspell-config::memory::MemoryConfig`): a plain `serde`-derived struct
//! with `#[serde(default)]`, a `Default` impl carrying the spec's documented
//! defaults, and a builder for programmatic construction. Unlike
//! `llmspell-config`'s full layered/profile system, this carries no
//! environment-variable layering machinery — out of proportion for a config
//! this small; `ResolutionOptions::from_toml_str` covers the one layering
//! need the core has (loading a file over the defaults).

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// One rewrite rule applied by the normalizer (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationRule {
    pub name: String,
    /// Regex pattern, compiled once at normalizer construction.
    pub pattern: String,
    pub replacement: String,
    /// Rules run in ascending priority order (lower runs first).
    pub priority: i32,
    /// Empty means "applies to all entity types".
    #[serde(default)]
    pub applicable_types: Vec<String>,
}

impl NormalizationRule {
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, replacement: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
            priority,
            applicable_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_types(mut self, types: Vec<String>) -> Self {
        self.applicable_types = types;
        self
    }
}

/// Weights for the composite similarity score (§4.C). Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub levenshtein: f64,
    pub jaro_winkler: f64,
    pub jaccard: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            levenshtein: 0.40,
            jaro_winkler: 0.35,
            jaccard: 0.25,
        }
    }
}

/// Decision thresholds (§4.E). Must satisfy `review <= synonym <= auto_merge`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub auto_merge: f64,
    pub synonym: f64,
    pub review: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            auto_merge: 0.92,
            synonym: 0.80,
            review: 0.60,
        }
    }
}

/// Full resolution configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionOptions {
    pub thresholds: Thresholds,
    pub auto_merge_enabled: bool,
    pub use_llm: bool,
    pub llm_confidence_threshold: f64,
    pub source_system: String,
    pub confidence_decay_lambda: f64,
    pub reinforcement_cap: f64,
    pub negative_reinforcement_penalty: f64,
    pub max_batch_size: usize,
    pub batch_commit_chunk_size: usize,
    pub max_batch_memory_bytes: u64,
    pub caching_enabled: bool,
    pub cache_max_size: usize,
    pub cache_ttl_seconds: u64,
    pub lock_timeout_ms: u64,
    pub async_timeout_ms: u64,
    pub similarity_weights: SimilarityWeights,
    /// `None` means "use the built-in default rule set" (§4.A).
    pub normalization_rules: Option<Vec<NormalizationRule>>,
    /// Full-scan fallback (§4.D stage 4) only runs below this corpus size.
    pub full_scan_size_limit: usize,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            auto_merge_enabled: true,
            use_llm: false,
            llm_confidence_threshold: 0.75,
            source_system: "entity-resolver".to_string(),
            confidence_decay_lambda: 0.001,
            reinforcement_cap: 0.15,
            negative_reinforcement_penalty: 0.25,
            max_batch_size: 100_000,
            batch_commit_chunk_size: 1_000,
            max_batch_memory_bytes: 256 * 1024 * 1024,
            caching_enabled: true,
            cache_max_size: 10_000,
            cache_ttl_seconds: 300,
            lock_timeout_ms: 5_000,
            async_timeout_ms: 30_000,
            similarity_weights: SimilarityWeights::default(),
            normalization_rules: None,
            full_scan_size_limit: 5_000,
        }
    }
}

impl ResolutionOptions {
    #[must_use]
    pub fn builder() -> ResolutionOptionsBuilder {
        ResolutionOptionsBuilder::new()
    }

    /// Load options from a TOML document, applied over the defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let options: Self = toml::from_str(toml_str)
            .map_err(|e| CoreError::Configuration(format!("invalid TOML: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Enforce the invariants spec §6 documents: similarity weights sum to
    /// 1.0, and `review <= synonym <= auto_merge`.
    pub fn validate(&self) -> Result<()> {
        let w = &self.similarity_weights;
        let sum = w.levenshtein + w.jaro_winkler + w.jaccard;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::Configuration(format!(
                "similarity weights must sum to 1.0, got {sum}"
            )));
        }
        let t = &self.thresholds;
        if !(t.review <= t.synonym && t.synonym <= t.auto_merge) {
            return Err(CoreError::Configuration(format!(
                "thresholds must satisfy review <= synonym <= auto_merge, got review={}, synonym={}, auto_merge={}",
                t.review, t.synonym, t.auto_merge
            )));
        }
        for threshold in [t.auto_merge, t.synonym, t.review, self.llm_confidence_threshold] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(CoreError::Configuration(format!(
                    "thresholds must lie in [0,1], got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`ResolutionOptions`].
#[derive(Debug, Clone, Default)]
pub struct ResolutionOptionsBuilder {
    options: ResolutionOptions,
}

impl ResolutionOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ResolutionOptions::default(),
        }
    }

    #[must_use]
    pub const fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.options.thresholds = thresholds;
        self
    }

    #[must_use]
    pub const fn auto_merge_enabled(mut self, enabled: bool) -> Self {
        self.options.auto_merge_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn use_llm(mut self, use_llm: bool) -> Self {
        self.options.use_llm = use_llm;
        self
    }

    #[must_use]
    pub const fn llm_confidence_threshold(mut self, threshold: f64) -> Self {
        self.options.llm_confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn source_system(mut self, source_system: impl Into<String>) -> Self {
        self.options.source_system = source_system.into();
        self
    }

    #[must_use]
    pub const fn similarity_weights(mut self, weights: SimilarityWeights) -> Self {
        self.options.similarity_weights = weights;
        self
    }

    #[must_use]
    pub const fn batch_commit_chunk_size(mut self, size: usize) -> Self {
        self.options.batch_commit_chunk_size = size;
        self
    }

    #[must_use]
    pub const fn max_batch_memory_bytes(mut self, bytes: u64) -> Self {
        self.options.max_batch_memory_bytes = bytes;
        self
    }

    #[must_use]
    pub fn normalization_rules(mut self, rules: Vec<NormalizationRule>) -> Self {
        self.options.normalization_rules = Some(rules);
        self
    }

    /// Build, validating the result.
    pub fn build(self) -> Result<ResolutionOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ResolutionOptions::default().validate().unwrap();
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let opts = ResolutionOptions::builder()
            .similarity_weights(SimilarityWeights {
                levenshtein: 0.5,
                jaro_winkler: 0.5,
                jaccard: 0.5,
            })
            .build();
        assert!(opts.is_err());
    }

    #[test]
    fn rejects_out_of_order_thresholds() {
        let opts = ResolutionOptions::builder()
            .thresholds(Thresholds {
                auto_merge: 0.5,
                synonym: 0.8,
                review: 0.6,
            })
            .build();
        assert!(opts.is_err());
    }

    #[test]
    fn from_toml_overrides_defaults() {
        let toml_str = r#"
            auto_merge_enabled = false
            source_system = "crm-import"

            [thresholds]
            auto_merge = 0.95
            synonym = 0.80
            review = 0.60
        "#;
        let options = ResolutionOptions::from_toml_str(toml_str).unwrap();
        assert!(!options.auto_merge_enabled);
        assert_eq!(options.source_system, "crm-import");
        assert!((options.thresholds.auto_merge - 0.95).abs() < 1e-9);
    }
}
