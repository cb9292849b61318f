//! Raw evidentiary score of a single chain.

use crate::graph::Chain;
use crate::scoring::{ScoreComponents, ScoredChain, Tier, WeightConfiguration};

/// Score a chain against a weight snapshot.
///
/// ```text
/// raw = (Σ node weights + Σ edge weights + Σ property bonuses + Σ edge bonuses) * decay(hops)
/// ```
///
/// Unknown node and edge types fall back to the configured defaults. The
/// result is not normalized yet: `score_norm` is 0 and `tier` is minimal.
pub fn score_chain(chain: Chain, weights: &WeightConfiguration) -> ScoredChain {
    let defaults = &weights.defaults;

    let mut sum_node_weight = 0.0;
    let mut sum_property_bonus = 0.0;
    for node in chain.nodes() {
        sum_node_weight += weights.node_weight(&node.node_type);
        sum_property_bonus += node
            .property_keys
            .iter()
            .filter_map(|key| weights.node_bonuses.bonus(key, defaults.property_bonus))
            .sum::<f64>();
    }

    let mut sum_edge_weight = 0.0;
    let mut sum_edge_bonus = 0.0;
    for edge in chain.edges() {
        sum_edge_weight += weights.edge_weight(&edge.relation_type);
        sum_edge_bonus += weights.edge_bonuses.bonus(edge.canonical);
    }

    let hop_count = chain.hop_count();
    let decay_multiplier = defaults.hop_decay.multiplier(hop_count);
    let score_raw =
        (sum_node_weight + sum_edge_weight + sum_property_bonus + sum_edge_bonus) * decay_multiplier;

    ScoredChain {
        chain,
        score_raw,
        score_norm: 0.0,
        tier: Tier::Minimal,
        score_components: ScoreComponents {
            sum_node_weight,
            sum_edge_weight,
            sum_property_bonus,
            sum_edge_bonus,
            hop_count,
            hop_decay: defaults.hop_decay.describe(),
            decay_multiplier,
        },
    }
}
