//! Blocking-key generation (spec §4.B): coarse, cheap keys that narrow the
//! candidate set before fuzzy scoring.

use std::collections::BTreeSet;

/// Produce the distinct union of blocking-key families for a normalized
/// name. Deterministic given the same input (spec §8 idempotence property).
#[must_use]
pub fn blocking_keys(normalized_name: &str) -> Vec<String> {
    let mut keys = BTreeSet::new();

    let compact: String = normalized_name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if !compact.is_empty() {
        let prefix_len = compact.len().min(3);
        keys.insert(format!("pfx:{}", &compact[..prefix_len]));

        let bg_len = compact.len().min(2);
        keys.insert(format!("bg:{}", &compact[..bg_len]));
    }

    let mut tokens: Vec<&str> = normalized_name.split_whitespace().take(2).collect();
    tokens.sort_unstable();
    if !tokens.is_empty() {
        keys.insert(format!("tok:{}", tokens.join("|")));
    }

    keys.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_at_least_three_key_families_for_a_multiword_name() {
        let keys = blocking_keys("international business machines");
        assert!(keys.iter().any(|k| k.starts_with("pfx:")));
        assert!(keys.iter().any(|k| k.starts_with("tok:")));
        assert!(keys.iter().any(|k| k.starts_with("bg:")));
    }

    #[test]
    fn short_names_collapse_prefix_to_whole_string() {
        let keys = blocking_keys("ibm");
        assert!(keys.contains(&"pfx:ibm".to_string()));
    }

    #[test]
    fn token_key_is_order_independent() {
        let a = blocking_keys("acme global");
        let b_tokens = blocking_keys("global acme");
        let a_tok: Vec<&String> = a.iter().filter(|k| k.starts_with("tok:")).collect();
        let b_tok: Vec<&String> = b_tokens.iter().filter(|k| k.starts_with("tok:")).collect();
        assert_eq!(a_tok, b_tok);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(blocking_keys("acme corp"), blocking_keys("acme corp"));
    }
}
