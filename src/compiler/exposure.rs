//! Exposure policy synthesis
//!
//! Maps each asset to its maximum allowed portfolio share. The quote asset
//! always takes a fixed share; whatever remains is split evenly over the
//! configured tokens. The shares always sum to 1.0.

use std::collections::BTreeMap;

/// Share reserved for the quote asset
const QUOTE_SHARE: f64 = 0.6;

/// Share split across the traded tokens
const REMAINING_SHARE: f64 = 0.4;

/// Build the per-asset exposure policy
///
/// With no non-quote tokens configured, the whole remaining share falls to
/// `fallback_asset` so the policy still covers the full portfolio.
pub fn build_exposure_policy(
    tokens: &[String],
    quote_asset: &str,
    fallback_asset: &str,
) -> BTreeMap<String, f64> {
    let mut policy = BTreeMap::new();
    policy.insert(quote_asset.to_string(), QUOTE_SHARE);

    let other_tokens: Vec<&String> = tokens.iter().filter(|t| *t != quote_asset).collect();

    if other_tokens.is_empty() {
        policy.insert(fallback_asset.to_string(), REMAINING_SHARE);
        return policy;
    }

    let share = REMAINING_SHARE / other_tokens.len() as f64;
    for token in other_tokens {
        policy.insert(token.clone(), share);
    }

    policy
}
