use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub kgpath: KgpathConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub weights: WeightsSourceConfig,
}

/// Store location and process-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct KgpathConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// Path search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Relationship types a chain may traverse.
    #[serde(default = "default_canonical_relations")]
    pub canonical_relations: Vec<String>,
    /// Hop limit used when the question does not name one.
    #[serde(default = "default_hop_limit")]
    pub default_hop_limit: usize,
    #[serde(default = "default_max_paths_per_level")]
    pub max_paths_per_level: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            canonical_relations: default_canonical_relations(),
            default_hop_limit: default_hop_limit(),
            max_paths_per_level: default_max_paths_per_level(),
        }
    }
}

/// A label substring that marks a candidate as noise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoisePattern {
    /// Matched case-insensitively against the candidate label.
    pub pattern: String,
    pub penalty: i64,
}

/// Candidate resolution heuristics
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_max_raw_matches")]
    pub max_raw_matches: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Entity types in descending preference.
    #[serde(default = "default_type_preference")]
    pub type_preference: Vec<String>,
    /// Skipped when the question explicitly asks for a list.
    #[serde(default = "default_noise_patterns")]
    pub noise_patterns: Vec<NoisePattern>,
    #[serde(default = "default_type_penalties")]
    pub type_penalties: BTreeMap<String, i64>,
    /// Labels shorter than this earn a small bonus per missing character.
    #[serde(default = "default_long_label_threshold")]
    pub long_label_threshold: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_raw_matches: default_max_raw_matches(),
            max_candidates: default_max_candidates(),
            type_preference: default_type_preference(),
            noise_patterns: default_noise_patterns(),
            type_penalties: default_type_penalties(),
            long_label_threshold: default_long_label_threshold(),
        }
    }
}

/// Where scoring weights come from and how long a snapshot stays fresh
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsSourceConfig {
    /// JSON overlay on top of the built-in weights. None = built-in only.
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default = "default_weights_ttl")]
    pub ttl_seconds: u64,
}

impl Default for WeightsSourceConfig {
    fn default() -> Self {
        Self {
            source: None,
            ttl_seconds: default_weights_ttl(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_canonical_relations() -> Vec<String> {
    [
        "PART_OF",
        "IS_COMPOSED_OF",
        "EXPRESSED_AS",
        "ABOUT",
        "MENTIONS",
        "MEASURES",
        "INSTANCE_OF",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hop_limit() -> usize {
    10
}

fn default_max_paths_per_level() -> usize {
    2
}

fn default_max_raw_matches() -> usize {
    10
}

fn default_max_candidates() -> usize {
    5
}

fn default_type_preference() -> Vec<String> {
    [
        "InformationUse",
        "KnowledgeSet",
        "Construct",
        "DictionaryItem",
        "ActionStatement",
        "Resource",
        "Deliverable",
        "Content",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_noise_patterns() -> Vec<NoisePattern> {
    vec![
        NoisePattern { pattern: " list".to_string(), penalty: 250 },
        NoisePattern { pattern: "211in".to_string(), penalty: 300 },
        NoisePattern { pattern: "greek".to_string(), penalty: 200 },
    ]
}

fn default_type_penalties() -> BTreeMap<String, i64> {
    BTreeMap::from([("Deliverable".to_string(), 150)])
}

fn default_long_label_threshold() -> usize {
    50
}

fn default_weights_ttl() -> u64 {
    300
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KGPATH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KGPATH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.search.canonical_relations.is_empty() {
            anyhow::bail!("search.canonical_relations must list at least one relationship type");
        }

        if self
            .search
            .canonical_relations
            .iter()
            .any(|r| r.trim().is_empty())
        {
            anyhow::bail!("search.canonical_relations must not contain empty entries");
        }

        if !(1..=25).contains(&self.search.default_hop_limit) {
            anyhow::bail!("search.default_hop_limit must be between 1 and 25");
        }

        if self.search.max_paths_per_level == 0 {
            anyhow::bail!("search.max_paths_per_level must be greater than 0");
        }

        if self.resolver.max_raw_matches == 0 || self.resolver.max_candidates == 0 {
            anyhow::bail!("resolver.max_raw_matches and resolver.max_candidates must be greater than 0");
        }

        if !(5..=86_400).contains(&self.weights.ttl_seconds) {
            anyhow::bail!("weights.ttl_seconds must be between 5 and 86400");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.kgpath.db_path
    }

    /// Get migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.kgpath.migrations_dir
    }
}
