//! Progressive canonical path search.
//!
//! Starts at one hop and widens one level at a time until the store returns
//! chains or the ceiling is reached. Each level is a full shortest-path
//! query; nothing is carried over between levels.

use std::time::Instant;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::graph::{Chain, GraphStore};
use crate::question::MAX_REQUESTED_HOPS;

/// Hard cap on the hop level the search will reach, whatever was asked for.
pub const SEARCH_CEILING: usize = 10;

/// Effective ceiling for a requested hop limit.
pub fn search_ceiling(requested_hops: usize) -> usize {
    requested_hops.clamp(1, MAX_REQUESTED_HOPS).min(SEARCH_CEILING)
}

/// Result of one progressive search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Chains from the first level that produced any, at most
    /// `max_paths_per_level` of them, in store order.
    pub chains: Vec<Chain>,
    /// Hop levels queried, in order.
    pub levels_tried: Vec<usize>,
    pub ceiling: usize,
}

impl SearchOutcome {
    /// Hop level that produced the chains, if any did.
    pub fn found_at(&self) -> Option<usize> {
        if self.chains.is_empty() {
            None
        } else {
            self.levels_tried.last().copied()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressiveSearch {
    canonical_relations: Vec<String>,
    max_paths_per_level: usize,
}

impl ProgressiveSearch {
    pub fn new(canonical_relations: Vec<String>, max_paths_per_level: usize) -> Self {
        Self {
            canonical_relations,
            max_paths_per_level: max_paths_per_level.max(1),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.canonical_relations.clone(), config.max_paths_per_level)
    }

    pub fn canonical_relations(&self) -> &[String] {
        &self.canonical_relations
    }

    pub async fn run<S: GraphStore>(
        &self,
        store: &S,
        source_id: &str,
        target_id: &str,
        requested_hops: usize,
    ) -> Result<SearchOutcome> {
        let ceiling = search_ceiling(requested_hops);
        let mut outcome = SearchOutcome {
            ceiling,
            ..Default::default()
        };

        if source_id == target_id {
            log::info!("Both terms resolved to {}; nothing to connect", source_id);
            return Ok(outcome);
        }

        for hops in 1..=ceiling {
            let start = Instant::now();
            outcome.levels_tried.push(hops);
            let found = store
                .shortest_paths(
                    source_id,
                    target_id,
                    hops,
                    &self.canonical_relations,
                    self.max_paths_per_level,
                )
                .await?;

            let chains: Vec<Chain> = found
                .into_iter()
                .filter(|chain| self.accept(chain, hops))
                .take(self.max_paths_per_level)
                .collect();
            log::debug!(
                "Canonical search at {} hops: {} chain(s) in {:?}",
                hops,
                chains.len(),
                start.elapsed()
            );

            if !chains.is_empty() {
                outcome.chains = chains;
                return Ok(outcome);
            }
        }

        log::info!(
            "No canonical chain between {} and {} within {} hops",
            source_id,
            target_id,
            ceiling
        );
        Ok(outcome)
    }

    fn accept(&self, chain: &Chain, hops: usize) -> bool {
        if chain.hop_count() == 0 || chain.hop_count() > hops {
            log::warn!(
                "Discarding chain with {} hops from a {}-hop query",
                chain.hop_count(),
                hops
            );
            return false;
        }
        if !chain.uses_only(&self.canonical_relations) {
            log::warn!(
                "Discarding chain with non-canonical relations: {}",
                chain.edge_types().join(", ")
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::KgpathError;
    use crate::graph::{test_edge, test_node, Candidate};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store. `shortest_paths` returns the shortest stored chains
    /// that fit the hop cap, ignoring ids and the whitelist.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub(crate) candidates: HashMap<String, Vec<Candidate>>,
        pub(crate) chains: Vec<Chain>,
        pub(crate) fail_candidates: bool,
        pub(crate) fail_paths: bool,
        pub(crate) path_calls: Mutex<Vec<usize>>,
    }

    impl FakeStore {
        pub(crate) fn with_candidate(mut self, term: &str, id: &str, entity_type: &str, label: &str) -> Self {
            self.candidates.entry(term.to_lowercase()).or_default().push(Candidate {
                id: id.to_string(),
                entity_type: entity_type.to_string(),
                label: label.to_string(),
                match_rank: 3,
            });
            self
        }

        pub(crate) fn with_chain(mut self, chain: Chain) -> Self {
            self.chains.push(chain);
            self
        }

        pub(crate) fn calls(&self) -> Vec<usize> {
            self.path_calls.lock().unwrap().clone()
        }
    }

    impl GraphStore for FakeStore {
        async fn find_candidates(&self, term: &str, limit: usize) -> Result<Vec<Candidate>> {
            if self.fail_candidates {
                return Err(KgpathError::GraphStore("candidate index offline".to_string()));
            }
            let mut found = self.candidates.get(&term.to_lowercase()).cloned().unwrap_or_default();
            found.truncate(limit);
            Ok(found)
        }

        async fn shortest_paths(
            &self,
            _source_id: &str,
            _target_id: &str,
            max_hops: usize,
            _allowed_types: &[String],
            limit: usize,
        ) -> Result<Vec<Chain>> {
            self.path_calls.lock().unwrap().push(max_hops);
            if self.fail_paths {
                return Err(KgpathError::GraphStore("connection reset".to_string()));
            }
            let Some(best) = self
                .chains
                .iter()
                .map(Chain::hop_count)
                .filter(|h| *h <= max_hops)
                .min()
            else {
                return Ok(Vec::new());
            };
            Ok(self
                .chains
                .iter()
                .filter(|c| c.hop_count() == best)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    pub(crate) fn linear_chain(ids: &[&str], relations: &[&str]) -> Chain {
        Chain::new(
            ids.iter().map(|id| test_node(id, "Construct")).collect(),
            relations.iter().map(|r| test_edge(r)).collect(),
        )
        .unwrap()
    }

    fn search() -> ProgressiveSearch {
        ProgressiveSearch::from_config(&SearchConfig::default())
    }

    #[test]
    fn test_ceiling_clamps_then_caps() {
        assert_eq!(search_ceiling(0), 1);
        assert_eq!(search_ceiling(4), 4);
        assert_eq!(search_ceiling(10), 10);
        assert_eq!(search_ceiling(25), 10);
        assert_eq!(search_ceiling(99), 10);
    }

    #[tokio::test]
    async fn test_stops_at_first_level_with_chains() {
        let store = FakeStore::default().with_chain(linear_chain(&["a", "m", "n", "b"], &["PART_OF", "ABOUT", "MENTIONS"]));
        let outcome = search().run(&store, "a", "b", 10).await.unwrap();
        assert_eq!(outcome.chains.len(), 1);
        assert_eq!(outcome.levels_tried, vec![1, 2, 3]);
        assert_eq!(outcome.found_at(), Some(3));
        assert_eq!(store.calls(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_exhausts_up_to_ceiling() {
        let store = FakeStore::default();
        let outcome = search().run(&store, "a", "b", 25).await.unwrap();
        assert!(outcome.chains.is_empty());
        assert_eq!(outcome.ceiling, 10);
        assert_eq!(store.calls(), (1..=10).collect::<Vec<_>>());
        assert_eq!(outcome.found_at(), None);
    }

    #[tokio::test]
    async fn test_requested_limit_below_chain_length() {
        let store = FakeStore::default().with_chain(linear_chain(&["a", "m", "b"], &["PART_OF", "ABOUT"]));
        let outcome = search().run(&store, "a", "b", 1).await.unwrap();
        assert!(outcome.chains.is_empty());
        assert_eq!(store.calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_at_most_two_chains_per_level() {
        let store = FakeStore {
            chains: vec![
                linear_chain(&["a", "m1", "b"], &["PART_OF", "ABOUT"]),
                linear_chain(&["a", "m2", "b"], &["PART_OF", "PART_OF"]),
                linear_chain(&["a", "m3", "b"], &["ABOUT", "ABOUT"]),
            ],
            ..Default::default()
        };
        let outcome = search().run(&store, "a", "b", 10).await.unwrap();
        assert_eq!(outcome.chains.len(), 2);
        assert_eq!(outcome.chains[0].nodes()[1].id, "m1");
        assert_eq!(outcome.chains[1].nodes()[1].id, "m2");
    }

    #[tokio::test]
    async fn test_non_canonical_chains_are_discarded() {
        let store = FakeStore::default().with_chain(linear_chain(&["a", "b"], &["LINKS_TO"]));
        let outcome = search().run(&store, "a", "b", 3).await.unwrap();
        assert!(outcome.chains.is_empty());
        assert_eq!(outcome.levels_tried, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_same_entity_does_not_query() {
        let store = FakeStore::default();
        let outcome = search().run(&store, "a", "a", 10).await.unwrap();
        assert!(outcome.chains.is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let store = FakeStore {
            fail_paths: true,
            ..Default::default()
        };
        let err = search().run(&store, "a", "b", 10).await.unwrap_err();
        assert!(matches!(err, KgpathError::GraphStore(_)));
        assert_eq!(store.calls(), vec![1]);
    }
}
