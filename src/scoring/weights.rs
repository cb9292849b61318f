//! Typed scoring weights with built-in defaults and a JSON overlay format.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{KgpathError, Result};
use crate::scoring::Tier;

pub const BUILTIN_VERSION: &str = "builtin-default";

/// How chain scores shrink with length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HopDecay {
    /// `base ^ hops`
    Base(f64),
    /// `exp(-lambda * hops)`
    Lambda(f64),
}

impl HopDecay {
    pub fn multiplier(&self, hops: usize) -> f64 {
        let hops = hops as f64;
        match *self {
            HopDecay::Base(base) => base.powf(hops),
            HopDecay::Lambda(lambda) => (-lambda * hops).exp(),
        }
    }

    /// Longer chains must never score higher: the base has to lie in
    /// `(0, 1]` and lambda must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        match *self {
            HopDecay::Base(base) if !(base > 0.0 && base <= 1.0) => Err(KgpathError::Config(format!(
                "hop_decay must be in (0, 1] (got {})",
                base
            ))),
            HopDecay::Lambda(lambda) if !(lambda.is_finite() && lambda >= 0.0) => Err(KgpathError::Config(format!(
                "hop_decay_lambda must be finite and >= 0 (got {})",
                lambda
            ))),
            _ => Ok(()),
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            HopDecay::Base(base) => format!("{}", base),
            HopDecay::Lambda(lambda) => format!("exp(-{}*hops)", lambda),
        }
    }
}

/// Fallback weights for anything the per-type tables do not name.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightDefaults {
    pub node_weight: f64,
    pub edge_weight: f64,
    pub property_bonus: f64,
    pub hop_decay: HopDecay,
}

/// Node property names that earn a bonus. An entry without a value earns
/// the default property bonus; names not in the table earn nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeBonusTable {
    entries: BTreeMap<String, Option<f64>>,
}

impl NodeBonusTable {
    pub fn new(entries: BTreeMap<String, Option<f64>>) -> Self {
        Self { entries }
    }

    pub fn bonus(&self, key: &str, default: f64) -> Option<f64> {
        self.entries.get(key).map(|v| v.unwrap_or(default))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flat bonus (or penalty) per edge, keyed by the edge's canonical flag.
/// A missing side contributes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeBonusTable {
    pub canonical: Option<f64>,
    pub non_canonical: Option<f64>,
}

impl EdgeBonusTable {
    pub fn bonus(&self, canonical: bool) -> f64 {
        let v = if canonical { self.canonical } else { self.non_canonical };
        v.unwrap_or(0.0)
    }
}

/// Normalized-score cut points, `high >= medium >= low`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high: 0.85,
            medium: 0.65,
            low: 0.35,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score_norm: f64) -> Tier {
        let s = if score_norm.is_finite() { score_norm } else { 0.0 };
        if s >= self.high {
            Tier::High
        } else if s >= self.medium {
            Tier::Medium
        } else if s >= self.low {
            Tier::Low
        } else {
            Tier::Minimal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPolicy {
    /// Always within `[1, 25]`.
    pub max_paths_to_show: usize,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self { max_paths_to_show: 3 }
    }
}

/// Immutable per-request scoring snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfiguration {
    pub version: String,
    pub updated_utc: Option<String>,
    pub defaults: WeightDefaults,
    pub node_types: BTreeMap<String, f64>,
    pub edge_types: BTreeMap<String, f64>,
    pub node_bonuses: NodeBonusTable,
    pub edge_bonuses: EdgeBonusTable,
    pub tiers: TierThresholds,
    pub display: DisplayPolicy,
}

impl Default for WeightConfiguration {
    fn default() -> Self {
        Self::builtin()
    }
}

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl WeightConfiguration {
    /// Weights used when no overlay is configured or loadable.
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_VERSION.to_string(),
            updated_utc: None,
            defaults: WeightDefaults {
                node_weight: 0.40,
                edge_weight: 0.30,
                property_bonus: 0.0,
                hop_decay: HopDecay::Base(0.85),
            },
            node_types: table(&[
                ("Construct", 0.95),
                ("InformationUse", 0.95),
                ("ActionStatement", 0.90),
                ("DictionaryItem", 0.70),
                ("Content", 0.35),
                ("Deliverable", 0.30),
                ("Resource", 0.25),
            ]),
            edge_types: table(&[
                ("PART_OF", 0.95),
                ("IS_COMPOSED_OF", 0.90),
                ("EXPRESSED_AS", 0.85),
                ("ABOUT", 0.60),
                ("MENTIONS", 0.40),
                ("CONTAINS", 0.35),
                ("LINKS_TO", 0.20),
                ("INSTANCE_OF", 0.25),
            ]),
            node_bonuses: NodeBonusTable::default(),
            edge_bonuses: EdgeBonusTable::default(),
            tiers: TierThresholds::default(),
            display: DisplayPolicy::default(),
        }
    }

    /// Parse a JSON overlay and merge it over the built-in weights. Type
    /// tables merge key by key; scalar settings replace the built-in value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: WeightsFile = serde_json::from_str(json)?;
        let mut weights = Self::builtin();

        if let Some(version) = file.version {
            weights.version = version;
        } else {
            weights.version = "unknown".to_string();
        }
        weights.updated_utc = file.updated_utc.filter(|s| !s.is_empty());

        let d = file.defaults;
        if let Some(v) = d.node_weight {
            weights.defaults.node_weight = v;
        }
        if let Some(v) = d.edge_weight {
            weights.defaults.edge_weight = v;
        }
        if let Some(v) = d.property_bonus {
            weights.defaults.property_bonus = v;
        }
        if let Some(lambda) = d.hop_decay_lambda {
            weights.defaults.hop_decay = HopDecay::Lambda(lambda);
        } else if let Some(base) = d.hop_decay {
            weights.defaults.hop_decay = HopDecay::Base(base);
        }
        weights.defaults.hop_decay.validate()?;

        weights.node_types.extend(file.node_types);
        weights.edge_types.extend(file.edge_types);

        if !file.property_bonuses.node.is_empty() {
            weights.node_bonuses = NodeBonusTable::new(file.property_bonuses.node);
        }
        let canonical = &file.property_bonuses.edge.canonical;
        weights.edge_bonuses = EdgeBonusTable {
            canonical: canonical.get("true").copied(),
            non_canonical: canonical.get("false").copied(),
        };

        let t = file.tiers;
        weights.tiers = TierThresholds {
            high: t.high.unwrap_or(weights.tiers.high),
            medium: t.medium.unwrap_or(weights.tiers.medium),
            low: t.low.unwrap_or(weights.tiers.low),
        };
        if !(weights.tiers.high >= weights.tiers.medium && weights.tiers.medium >= weights.tiers.low) {
            return Err(KgpathError::Config(format!(
                "tier cut points must satisfy high >= medium >= low (got {}, {}, {})",
                weights.tiers.high, weights.tiers.medium, weights.tiers.low
            )));
        }

        if let Some(n) = file.display_policy.max_paths_to_show {
            weights.display.max_paths_to_show = n.clamp(1, 25) as usize;
        }

        Ok(weights)
    }

    pub fn node_weight(&self, node_type: &str) -> f64 {
        self.node_types
            .get(node_type)
            .copied()
            .unwrap_or(self.defaults.node_weight)
    }

    pub fn edge_weight(&self, relation_type: &str) -> f64 {
        self.edge_types
            .get(relation_type)
            .copied()
            .unwrap_or(self.defaults.edge_weight)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WeightsFile {
    version: Option<String>,
    updated_utc: Option<String>,
    #[serde(default)]
    defaults: DefaultsFile,
    #[serde(default)]
    node_types: BTreeMap<String, f64>,
    #[serde(default)]
    edge_types: BTreeMap<String, f64>,
    #[serde(default)]
    property_bonuses: PropertyBonusesFile,
    #[serde(default)]
    tiers: TiersFile,
    #[serde(default)]
    display_policy: DisplayPolicyFile,
}

#[derive(Debug, Default, Deserialize)]
struct DefaultsFile {
    node_weight: Option<f64>,
    edge_weight: Option<f64>,
    property_bonus: Option<f64>,
    hop_decay: Option<f64>,
    hop_decay_lambda: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PropertyBonusesFile {
    #[serde(default)]
    node: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    edge: EdgeBonusesFile,
}

#[derive(Debug, Default, Deserialize)]
struct EdgeBonusesFile {
    /// Keyed by "true" / "false".
    #[serde(default)]
    canonical: BTreeMap<String, f64>,
}

#[derive(Debug, Default, Deserialize)]
struct TiersFile {
    high: Option<f64>,
    medium: Option<f64>,
    low: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayPolicyFile {
    #[serde(alias = "max_paths_shown")]
    max_paths_to_show: Option<i64>,
}
