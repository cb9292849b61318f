//! Evidentiary scoring of chains: weights, raw scores, normalization and tiers.

pub mod normalize;
pub mod scorer;
pub mod weights;

pub use normalize::{group_by_tier, normalize, PathsByTier};
pub use scorer::score_chain;
pub use weights::{HopDecay, TierThresholds, WeightConfiguration};

use serde::Serialize;

use crate::graph::Chain;

/// Confidence tier of a normalized score. Ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Minimal,
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
            Tier::Minimal => "minimal",
        }
    }

    /// Coarse label for the evidence metrics; minimal collapses into "Low".
    pub fn confidence_label(&self) -> &'static str {
        match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low | Tier::Minimal => "Low",
        }
    }

    pub fn evidence_label(&self) -> &'static str {
        match self {
            Tier::High => "High Semantic Evidence",
            Tier::Medium => "Medium Semantic Evidence",
            Tier::Low => "Low Semantic Evidence",
            Tier::Minimal => "Minimal Evidence",
        }
    }
}

/// Every term that went into a raw score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub sum_node_weight: f64,
    pub sum_edge_weight: f64,
    pub sum_property_bonus: f64,
    pub sum_edge_bonus: f64,
    pub hop_count: usize,
    /// `"0.85"` or `"exp(-0.2*hops)"`.
    pub hop_decay: String,
    pub decay_multiplier: f64,
}

/// A chain with its raw score and, once normalized, its normalized score and tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChain {
    #[serde(flatten)]
    pub chain: Chain,
    pub score_raw: f64,
    pub score_norm: f64,
    pub tier: Tier,
    pub score_components: ScoreComponents,
}

impl ScoredChain {
    pub fn hop_count(&self) -> usize {
        self.chain.hop_count()
    }
}
