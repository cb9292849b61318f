//! Min-max normalization across one response, tiering, and ranking.

use std::cmp::Ordering;

use serde::Serialize;

use crate::scoring::{ScoredChain, Tier, TierThresholds};

/// Rescale raw scores to `[0, 1]` across `chains`, assign tiers, and sort by
/// normalized score (desc) then hop count (asc). The sort is stable.
///
/// When every raw score is equal the normalized score is 1 if that score is
/// positive and 0 otherwise. Non-finite raw scores count as 0.
pub fn normalize(mut chains: Vec<ScoredChain>, tiers: &TierThresholds) -> Vec<ScoredChain> {
    if chains.is_empty() {
        return chains;
    }

    let raw = |c: &ScoredChain| if c.score_raw.is_finite() { c.score_raw } else { 0.0 };
    let min = chains.iter().map(raw).fold(f64::INFINITY, f64::min);
    let max = chains.iter().map(raw).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for chain in &mut chains {
        let s = raw(&*chain);
        chain.score_norm = if range > 0.0 {
            ((s - min) / range).clamp(0.0, 1.0)
        } else if s > 0.0 {
            1.0
        } else {
            0.0
        };
        chain.tier = tiers.tier_for(chain.score_norm);
    }

    chains.sort_by(|a, b| {
        b.score_norm
            .partial_cmp(&a.score_norm)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.hop_count().cmp(&b.hop_count()))
    });
    chains
}

/// Sorted chains bucketed by tier, preserving order within each bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathsByTier {
    pub high: Vec<ScoredChain>,
    pub medium: Vec<ScoredChain>,
    pub low: Vec<ScoredChain>,
    pub minimal: Vec<ScoredChain>,
}

pub fn group_by_tier(chains: &[ScoredChain]) -> PathsByTier {
    let mut groups = PathsByTier::default();
    for chain in chains {
        let bucket = match chain.tier {
            Tier::High => &mut groups.high,
            Tier::Medium => &mut groups.medium,
            Tier::Low => &mut groups.low,
            Tier::Minimal => &mut groups.minimal,
        };
        bucket.push(chain.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{test_edge, test_node, Chain};
    use crate::scoring::{score_chain, WeightConfiguration};

    fn chain_with(hops: usize, raw: f64) -> ScoredChain {
        let nodes = (0..=hops).map(|i| test_node(&format!("n{}", i), "X")).collect();
        let edges = (0..hops).map(|_| test_edge("PART_OF")).collect();
        let mut scored = score_chain(Chain::new(nodes, edges).unwrap(), &WeightConfiguration::builtin());
        scored.score_raw = raw;
        scored
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        assert!(normalize(Vec::new(), &TierThresholds::default()).is_empty());
    }

    #[test]
    fn test_two_scores_map_to_unit_range_and_sort_by_score() {
        // stronger chain is longer; score still wins over hop count
        let out = normalize(vec![chain_with(1, 2.0), chain_with(3, 4.0)], &TierThresholds::default());
        assert_eq!(out[0].score_raw, 4.0);
        assert_eq!(out[0].score_norm, 1.0);
        assert_eq!(out[0].tier, Tier::High);
        assert_eq!(out[1].score_raw, 2.0);
        assert_eq!(out[1].score_norm, 0.0);
        assert_eq!(out[1].tier, Tier::Minimal);
    }

    #[test]
    fn test_single_positive_chain_is_high() {
        let out = normalize(vec![chain_with(2, 2.7813)], &TierThresholds::default());
        assert_eq!(out[0].score_norm, 1.0);
        assert_eq!(out[0].tier, Tier::High);
    }

    #[test]
    fn test_equal_scores_positive_and_non_positive() {
        let out = normalize(vec![chain_with(1, 3.0), chain_with(2, 3.0)], &TierThresholds::default());
        assert!(out.iter().all(|c| c.score_norm == 1.0));

        let out = normalize(vec![chain_with(1, 0.0), chain_with(2, 0.0)], &TierThresholds::default());
        assert!(out.iter().all(|c| c.score_norm == 0.0 && c.tier == Tier::Minimal));
    }

    #[test]
    fn test_ties_prefer_fewer_hops() {
        let out = normalize(
            vec![chain_with(3, 5.0), chain_with(1, 5.0), chain_with(2, 1.0)],
            &TierThresholds::default(),
        );
        assert_eq!(out[0].hop_count(), 1);
        assert_eq!(out[1].hop_count(), 3);
        assert_eq!(out[2].hop_count(), 2);
    }

    #[test]
    fn test_bounds_hold_for_mixed_scores() {
        let out = normalize(
            vec![
                chain_with(1, -1.0),
                chain_with(1, 0.3),
                chain_with(2, 7.5),
                chain_with(2, f64::NAN),
                chain_with(4, 2.2),
            ],
            &TierThresholds::default(),
        );
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|c| (0.0..=1.0).contains(&c.score_norm)));
        assert_eq!(out[0].score_norm, 1.0);
        assert_eq!(out[4].score_norm, 0.0);
        for pair in out.windows(2) {
            assert!(pair[0].score_norm >= pair[1].score_norm);
        }
    }

    #[test]
    fn test_grouping_preserves_order() {
        let out = normalize(
            vec![chain_with(1, 10.0), chain_with(2, 9.0), chain_with(1, 5.0), chain_with(1, 0.0)],
            &TierThresholds::default(),
        );
        let groups = group_by_tier(&out);
        assert_eq!(groups.high.len(), 2);
        assert_eq!(groups.high[0].score_raw, 10.0);
        assert_eq!(groups.medium.len(), 0);
        assert_eq!(groups.low.len(), 1);
        assert_eq!(groups.minimal.len(), 1);
    }
}
