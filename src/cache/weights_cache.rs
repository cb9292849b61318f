//! Time-bounded cache of the scoring weights with last-good fallback.
//!
//! The provider is asked again once the TTL has passed. A failed reload keeps
//! serving the previous snapshot (or the built-in weights if there never was
//! one) and reports the failure on the snapshot instead of returning an error.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::scoring::WeightConfiguration;

pub const MIN_TTL_SECONDS: u64 = 5;
pub const MAX_TTL_SECONDS: u64 = 86_400;

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Weights as produced by a provider.
#[derive(Debug, Clone)]
pub struct LoadedWeights {
    pub weights: WeightConfiguration,
    pub source: String,
    pub note: Option<String>,
}

/// Supplies a full weight configuration on request.
pub trait WeightsProvider: Send + Sync {
    fn load(&self) -> Result<LoadedWeights>;
}

/// Reads a JSON overlay from disk. No path means built-in weights.
#[derive(Debug, Clone, Default)]
pub struct FileWeightsProvider {
    path: Option<PathBuf>,
}

impl FileWeightsProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl WeightsProvider for FileWeightsProvider {
    fn load(&self) -> Result<LoadedWeights> {
        let Some(path) = &self.path else {
            return Ok(LoadedWeights {
                weights: WeightConfiguration::builtin(),
                source: "builtin".to_string(),
                note: Some("No weights source configured; using built-in defaults.".to_string()),
            });
        };
        let json = std::fs::read_to_string(path)?;
        let weights = WeightConfiguration::from_json_str(&json)?;
        log::debug!("Loaded weights {} from {}", weights.version, path.display());
        Ok(LoadedWeights {
            weights,
            source: path.display().to_string(),
            note: None,
        })
    }
}

/// What a request gets: the weights plus advisory metadata.
#[derive(Debug, Clone)]
pub struct WeightsSnapshot {
    pub weights: Arc<WeightConfiguration>,
    pub source: String,
    pub note: Option<String>,
    pub from_cache: bool,
    /// Last load failure, if the most recent reload attempt failed.
    pub error: Option<String>,
}

impl WeightsSnapshot {
    pub fn version(&self) -> &str {
        &self.weights.version
    }

    /// Built-in weights standing in for a load that failed before anything
    /// was ever cached.
    pub fn builtin_fallback(error: String) -> Self {
        Self {
            weights: Arc::new(WeightConfiguration::builtin()),
            source: "builtin".to_string(),
            note: Some("Weights load failed; using built-in defaults.".to_string()),
            from_cache: false,
            error: Some(error),
        }
    }
}

#[derive(Debug)]
struct CacheState {
    loaded_at: Instant,
    weights: Arc<WeightConfiguration>,
    source: String,
    note: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<CacheState>,
    last_error: Option<String>,
}

/// TTL cache around a [`WeightsProvider`].
pub struct WeightsCache<P, C = SystemClock> {
    provider: P,
    clock: C,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl<P: WeightsProvider> WeightsCache<P, SystemClock> {
    pub fn new(provider: P, ttl_seconds: u64) -> Self {
        Self::with_clock(provider, SystemClock, ttl_seconds)
    }
}

impl<P: WeightsProvider, C: Clock> WeightsCache<P, C> {
    /// `ttl_seconds` is clamped to `[5, 86400]`.
    pub fn with_clock(provider: P, clock: C, ttl_seconds: u64) -> Self {
        Self {
            provider,
            clock,
            ttl: Duration::from_secs(ttl_seconds.clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS)),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Current weights. Never fails.
    pub fn get(&self) -> WeightsSnapshot {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(state) = &inner.current {
            if now.duration_since(state.loaded_at) < self.ttl {
                return snapshot(state, true, inner.last_error.clone());
            }
        }

        match self.provider.load() {
            Ok(loaded) => {
                let state = CacheState {
                    loaded_at: now,
                    weights: Arc::new(loaded.weights),
                    source: loaded.source,
                    note: loaded.note,
                };
                let fresh = snapshot(&state, false, None);
                inner.current = Some(state);
                inner.last_error = None;
                fresh
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("Weights load failed: {}", message);
                inner.last_error = Some(message.clone());
                match &inner.current {
                    Some(state) => snapshot(state, true, Some(message)),
                    None => WeightsSnapshot::builtin_fallback(message),
                }
            }
        }
    }
}

fn snapshot(state: &CacheState, from_cache: bool, error: Option<String>) -> WeightsSnapshot {
    WeightsSnapshot {
        weights: Arc::clone(&state.weights),
        source: state.source.clone(),
        note: state.note.clone(),
        from_cache,
        error,
    }
}

impl<P, C> std::fmt::Debug for WeightsCache<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightsCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
