//! One relationship question, end to end.
//!
//! resolve X, resolve Y -> progressive search -> score -> normalize -> evidence.
//! Every outcome, including upstream faults, comes back as a `QueryResponse`.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cache::{Clock, SystemClock, WeightsCache, WeightsProvider, WeightsSnapshot};
use crate::config::{ResolverConfig, SearchConfig};
use crate::error::{KgpathError, Result};
use crate::evidence::{self, EvidenceContext, EvidenceRecord};
use crate::graph::GraphStore;
use crate::question::{self, BetweenPattern, TermExtractor, DEFAULT_HOP_LIMIT};
use crate::resolve::{self, RankedCandidate};
use crate::scoring::{group_by_tier, normalize, score_chain, PathsByTier, ScoredChain};
use crate::search::ProgressiveSearch;

const TERMS_MISSING: &str = "Could not reliably extract X and Y terms from the question.";
const TERMS_UNRESOLVED: &str = "One or both terms did not resolve to any candidate nodes.";
const EVIDENCE_FAILED: &str = "Path search succeeded but evidence rendering failed";
const QUERY_FAILED: &str = "Relationship query failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    PathFound,
    TermNotFound,
    NoPath,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedCandidates {
    pub x: Vec<RankedCandidate>,
    pub y: Vec<RankedCandidate>,
}

/// Which weights scored this response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightsInfo {
    pub version: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_utc: Option<String>,
    pub from_cache: bool,
}

impl WeightsInfo {
    fn from_snapshot(snapshot: &WeightsSnapshot) -> Self {
        Self {
            version: snapshot.version().to_string(),
            source: snapshot.source.clone(),
            updated_utc: snapshot.weights.updated_utc.clone(),
            from_cache: snapshot.from_cache,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub status: QueryStatus,
    pub answer: String,
    pub question: String,
    pub hop_limit_used: usize,
    pub resolved_candidates: ResolvedCandidates,
    pub paths: Vec<ScoredChain>,
    pub paths_by_tier: PathsByTier,
    pub paths_count: usize,
    pub paths_shown: usize,
    pub weights: WeightsInfo,
    pub diagnostics: Vec<String>,
    /// Present only when the status is `PATH_FOUND` and rendering succeeded.
    pub evidence: Option<EvidenceRecord>,
}

impl QueryResponse {
    fn new(question: &str, snapshot: &WeightsSnapshot) -> Self {
        Self {
            status: QueryStatus::Error,
            answer: String::new(),
            question: question.to_string(),
            hop_limit_used: 0,
            resolved_candidates: ResolvedCandidates::default(),
            paths: Vec::new(),
            paths_by_tier: PathsByTier::default(),
            paths_count: 0,
            paths_shown: 0,
            weights: WeightsInfo::from_snapshot(snapshot),
            diagnostics: Vec::new(),
            evidence: None,
        }
    }

    fn best_label(candidates: &[RankedCandidate], fallback: &str) -> String {
        candidates
            .first()
            .map(|c| c.candidate.label.clone())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn label_x(&self) -> String {
        Self::best_label(&self.resolved_candidates.x, "X")
    }

    pub fn label_y(&self) -> String {
        Self::best_label(&self.resolved_candidates.y, "Y")
    }
}

/// Answers "how are X and Y related?" against a graph store.
pub struct RelationshipQa<S, E, P, C = SystemClock> {
    store: S,
    extractor: E,
    weights: Arc<WeightsCache<P, C>>,
    search: ProgressiveSearch,
    resolver: ResolverConfig,
    default_hop_limit: usize,
}

impl<S, E, P, C> RelationshipQa<S, E, P, C>
where
    S: GraphStore,
    E: TermExtractor,
    P: WeightsProvider + 'static,
    C: Clock + 'static,
{
    pub fn new(store: S, extractor: E, weights: WeightsCache<P, C>) -> Self {
        Self {
            store,
            extractor,
            weights: Arc::new(weights),
            search: ProgressiveSearch::from_config(&SearchConfig::default()),
            resolver: ResolverConfig::default(),
            default_hop_limit: DEFAULT_HOP_LIMIT,
        }
    }

    pub fn with_search_config(mut self, config: &SearchConfig) -> Self {
        self.search = ProgressiveSearch::from_config(config);
        self.default_hop_limit = config.default_hop_limit;
        self
    }

    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn answer(&self, question: &str) -> QueryResponse {
        let start = Instant::now();
        let snapshot = self.weights_snapshot().await;
        let mut out = QueryResponse::new(question, &snapshot);

        if let Some(note) = &snapshot.note {
            out.diagnostics.push(note.clone());
        }
        if let Some(err) = &snapshot.error {
            out.diagnostics.push(format!("Weights load error: {}", err));
        }

        if let Err(e) = self.run(question, &snapshot, &mut out).await {
            let had_paths = !out.paths.is_empty();
            if had_paths {
                log::warn!("Evidence unavailable for {:?}: {}", question, e);
                out.status = QueryStatus::PathFound;
                out.diagnostics.push(EVIDENCE_FAILED.to_string());
            } else {
                log::error!("Relationship query failed for {:?}: {}", question, e);
                out.status = QueryStatus::Error;
                out.answer = format!("{}.", QUERY_FAILED);
                out.diagnostics.push(QUERY_FAILED.to_string());
            }
            out.diagnostics.push(e.to_string());
            out.evidence = None;
        }

        log::info!(
            "{:?} for {:?}: {} path(s) in {:?}",
            out.status,
            question,
            out.paths_count,
            start.elapsed()
        );
        out
    }

    /// A reload may read from disk, so it runs off the async workers.
    async fn weights_snapshot(&self) -> WeightsSnapshot {
        let cache = Arc::clone(&self.weights);
        match tokio::task::spawn_blocking(move || cache.get()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Weights task failed: {}", e);
                WeightsSnapshot::builtin_fallback(e.to_string())
            }
        }
    }

    async fn run(&self, raw_question: &str, snapshot: &WeightsSnapshot, out: &mut QueryResponse) -> Result<()> {
        let text = question::strip_expert_prefix(raw_question);
        if text.is_empty() {
            return Err(KgpathError::InvalidInput("question is empty".to_string()));
        }
        let hop_limit = question::hop_limit_from_text(&text, self.default_hop_limit);
        out.hop_limit_used = hop_limit;

        let terms = self
            .extractor
            .extract(&text)?
            .or_fill(BetweenPattern.extract(&text)?);
        let (Some(x_term), Some(y_term)) = (terms.x.as_deref(), terms.y.as_deref()) else {
            out.status = QueryStatus::TermNotFound;
            out.answer = TERMS_MISSING.to_string();
            out.diagnostics.push(TERMS_MISSING.to_string());
            return Ok(());
        };
        log::debug!("Terms: {:?} / {:?}, hop limit {}", x_term, y_term, hop_limit);

        let wants_list = question::mentions_list(&text);
        out.resolved_candidates.x = resolve::resolve(&self.store, x_term, wants_list, &self.resolver).await?;
        out.resolved_candidates.y = resolve::resolve(&self.store, y_term, wants_list, &self.resolver).await?;

        let (Some(x_best), Some(y_best)) = (
            out.resolved_candidates.x.first().map(|c| c.candidate.id.clone()),
            out.resolved_candidates.y.first().map(|c| c.candidate.id.clone()),
        ) else {
            out.status = QueryStatus::TermNotFound;
            out.answer = TERMS_UNRESOLVED.to_string();
            out.diagnostics.push(TERMS_UNRESOLVED.to_string());
            return Ok(());
        };

        let outcome = self.search.run(&self.store, &x_best, &y_best, hop_limit).await?;
        out.diagnostics.extend(
            outcome
                .levels_tried
                .iter()
                .map(|hops| format!("Canonical search at {} hops", hops)),
        );

        if outcome.chains.is_empty() {
            out.status = QueryStatus::NoPath;
            out.answer = format!(
                "Could not find canonical relationships between \"{}\" and \"{}\" within {} hops. \
                 Only canonical relationship types ({}) are supported.",
                out.label_x(),
                out.label_y(),
                outcome.ceiling,
                self.search.canonical_relations().join(", ")
            );
            return Ok(());
        }

        let weights = &snapshot.weights;
        let scored = outcome
            .chains
            .into_iter()
            .map(|chain| score_chain(chain, weights))
            .collect();
        let sorted = normalize(scored, &weights.tiers);

        let (label_x, label_y) = (out.label_x(), out.label_y());
        out.paths_by_tier = group_by_tier(&sorted);
        out.paths_count = sorted.len();
        out.paths_shown = weights.display.max_paths_to_show.min(sorted.len());
        out.paths = sorted;
        out.status = QueryStatus::PathFound;
        out.answer = evidence::summary(out.paths_count, &label_x, &label_y);

        let ctx = EvidenceContext {
            label_x: &label_x,
            label_y: &label_y,
            weights_version: Some(weights.version.as_str()),
            weights_updated_utc: weights.updated_utc.as_deref(),
        };
        out.evidence = Some(evidence::render(&out.paths, weights.display.max_paths_to_show, &ctx)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileWeightsProvider;
    use crate::graph::store::tests::{insert_entity, insert_relation, migrated_db};
    use crate::graph::{test_edge, test_node, Chain, SqliteGraphStore};
    use crate::question::ExplicitTerms;
    use crate::scoring::Tier;
    use crate::search::tests::{linear_chain, FakeStore};
    use tempfile::TempDir;

    fn qa<S: GraphStore>(store: S) -> RelationshipQa<S, BetweenPattern, FileWeightsProvider> {
        RelationshipQa::new(store, BetweenPattern, WeightsCache::new(FileWeightsProvider::default(), 300))
    }

    fn resolvable() -> FakeStore {
        FakeStore::default()
            .with_candidate("asset information", "a", "InformationUse", "Asset Information")
            .with_candidate("bim uses", "b", "Construct", "BIM Uses")
    }

    const QUESTION: &str = "What is the relationship between Asset Information and BIM Uses?";

    #[tokio::test]
    async fn test_unresolved_term_is_term_not_found() {
        let store = FakeStore::default().with_candidate("bim uses", "b", "Construct", "BIM Uses");
        let qa = qa(store);
        let out = qa.answer(QUESTION).await;
        assert_eq!(out.status, QueryStatus::TermNotFound);
        assert!(out.evidence.is_none());
        assert!(out.resolved_candidates.x.is_empty());
        assert_eq!(out.resolved_candidates.y.len(), 1);
        assert!(qa.store().calls().is_empty());
        assert!(out.diagnostics.iter().any(|d| d == TERMS_UNRESOLVED));
    }

    #[tokio::test]
    async fn test_missing_terms_is_term_not_found() {
        let qa = qa(resolvable());
        let out = qa.answer("How does this work?").await;
        assert_eq!(out.status, QueryStatus::TermNotFound);
        assert_eq!(out.answer, TERMS_MISSING);
        assert_eq!(out.hop_limit_used, 10);
    }

    #[tokio::test]
    async fn test_explicit_terms_take_precedence() {
        let store = resolvable().with_chain(linear_chain(&["a", "b"], &["PART_OF"]));
        let qa = RelationshipQa::new(
            store,
            ExplicitTerms::new(Some("Asset Information".to_string()), Some("BIM Uses".to_string())),
            WeightsCache::new(FileWeightsProvider::default(), 300),
        );
        let out = qa.answer("how are these connected?").await;
        assert_eq!(out.status, QueryStatus::PathFound);
    }

    #[tokio::test]
    async fn test_no_chain_within_ceiling_is_no_path() {
        let qa = qa(resolvable());
        let out = qa.answer(QUESTION).await;
        assert_eq!(out.status, QueryStatus::NoPath);
        assert!(out.answer.contains("\"Asset Information\""));
        assert!(out.answer.contains("\"BIM Uses\""));
        assert!(out.answer.contains("within 10 hops"));
        assert!(out.answer.contains("PART_OF, IS_COMPOSED_OF"));
        assert!(out.evidence.is_none());
        assert_eq!(qa.store().calls(), (1..=10).collect::<Vec<_>>());
        assert!(out.diagnostics.iter().any(|d| d == "Canonical search at 10 hops"));
    }

    #[tokio::test]
    async fn test_stated_hop_limit_caps_search() {
        let qa = qa(resolvable().with_chain(linear_chain(&["a", "m", "n", "b"], &["PART_OF", "ABOUT", "ABOUT"])));
        let out = qa.answer("x: In 2 hops, what is the relationship between Asset Information and BIM Uses?").await;
        assert_eq!(out.status, QueryStatus::NoPath);
        assert_eq!(out.hop_limit_used, 2);
        assert!(out.answer.contains("within 2 hops"));
        assert_eq!(qa.store().calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_two_chains_are_normalized_and_ranked() {
        let store = resolvable()
            .with_chain(linear_chain(&["a", "m", "b"], &["MENTIONS", "MENTIONS"]))
            .with_chain(linear_chain(&["a", "n", "b"], &["PART_OF", "PART_OF"]));
        let qa = qa(store);
        let out = qa.answer(QUESTION).await;

        assert_eq!(out.status, QueryStatus::PathFound);
        assert_eq!(out.answer, "Found 2 path(s) between \"Asset Information\" and \"BIM Uses\".");
        assert_eq!(out.paths_count, 2);
        assert_eq!(out.paths_shown, 2);
        assert_eq!(out.paths[0].chain.nodes()[1].id, "n");
        assert_eq!(out.paths[0].score_norm, 1.0);
        assert_eq!(out.paths[0].tier, Tier::High);
        assert_eq!(out.paths[1].score_norm, 0.0);
        assert_eq!(out.paths_by_tier.high.len(), 1);
        assert_eq!(out.paths_by_tier.minimal.len(), 1);

        let evidence = out.evidence.unwrap();
        assert_eq!(evidence.metrics.score, 10.0);
        assert_eq!(evidence.metrics.confidence, "High");
        assert_eq!(evidence.graph.nodes.len(), 4);
        assert_eq!(evidence.graph.edges.len(), 2);
        assert_eq!(evidence.graph.edges[0].relation, "PART_OF");
        assert!(out.diagnostics.iter().any(|d| d.contains("No weights source configured")));
    }

    #[tokio::test]
    async fn test_store_fault_before_paths_is_error() {
        let store = FakeStore {
            fail_paths: true,
            ..resolvable()
        };
        let out = qa(store).answer(QUESTION).await;
        assert_eq!(out.status, QueryStatus::Error);
        assert!(out.evidence.is_none());
        assert!(out.paths.is_empty());
        assert!(out.diagnostics.iter().any(|d| d.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_resolver_fault_is_error() {
        let store = FakeStore {
            fail_candidates: true,
            ..Default::default()
        };
        let out = qa(store).answer(QUESTION).await;
        assert_eq!(out.status, QueryStatus::Error);
        assert!(out.diagnostics.iter().any(|d| d.contains("candidate index offline")));
    }

    #[tokio::test]
    async fn test_evidence_failure_keeps_path_found() {
        let anonymous = Chain::new(vec![test_node("", "Construct"), test_node("", "Construct")], vec![test_edge("PART_OF")])
            .unwrap();
        let out = qa(resolvable().with_chain(anonymous)).answer(QUESTION).await;
        assert_eq!(out.status, QueryStatus::PathFound);
        assert_eq!(out.paths.len(), 1);
        assert!(out.evidence.is_none());
        assert!(out.diagnostics.iter().any(|d| d == EVIDENCE_FAILED));
    }

    #[tokio::test]
    async fn test_empty_question_is_error() {
        let out = qa(resolvable()).answer("  x:  ").await;
        assert_eq!(out.status, QueryStatus::Error);
    }

    #[tokio::test]
    async fn test_scores_two_hop_chain_from_sqlite() {
        let (db, _temp) = migrated_db().await;
        insert_entity(&db, "a", "Concept", "Asset Information", None).await;
        insert_entity(&db, "m", "Module", "Information Model", None).await;
        insert_entity(&db, "b", "Concept", "BIM Uses", None).await;
        insert_entity(&db, "z", "Concept", "Shortcut", None).await;
        insert_relation(&db, "r1", "a", "PART_OF", "m", true).await;
        insert_relation(&db, "r2", "b", "ABOUT", "m", false).await;
        insert_relation(&db, "r3", "a", "LINKS_TO", "b", false).await;

        let temp_dir = TempDir::new().unwrap();
        let weights_path = temp_dir.path().join("weights.json");
        std::fs::write(
            &weights_path,
            r#"{
                "version": "scenario",
                "updated_utc": "2026-01-06T00:00:00Z",
                "node_types": { "Concept": 0.9, "Module": 0.5 },
                "edge_types": { "PART_OF": 0.95, "ABOUT": 0.6 },
                "defaults": { "hop_decay": 0.85 }
            }"#,
        )
        .unwrap();

        let qa = RelationshipQa::new(
            SqliteGraphStore::new(db),
            BetweenPattern,
            WeightsCache::new(FileWeightsProvider::new(Some(weights_path)), 300),
        );
        let out = qa.answer(QUESTION).await;

        assert_eq!(out.status, QueryStatus::PathFound, "{:?}", out.diagnostics);
        assert_eq!(out.paths.len(), 1);
        let top = &out.paths[0];
        assert_eq!(top.hop_count(), 2);
        assert_eq!(top.chain.edge_types(), vec!["PART_OF", "ABOUT"]);
        assert!((top.score_raw - 2.7813).abs() < 1e-4);
        assert_eq!(top.score_norm, 1.0);
        assert_eq!(top.tier, Tier::High);
        assert_eq!(out.weights.version, "scenario");
        assert!(!out.weights.from_cache);

        let evidence = out.evidence.unwrap();
        assert_eq!(evidence.metrics.hops, 2);
        assert!(evidence.text.contains("Asset Information [Concept] -PART_OF-> Information Model [Module]"));
        assert!(evidence.text.contains("updated 06 Jan 2026"));
    }

    /// Records the thread each load runs on.
    struct ThreadRecordingProvider {
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl WeightsProvider for ThreadRecordingProvider {
        fn load(&self) -> Result<crate::cache::LoadedWeights> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            FileWeightsProvider::default().load()
        }
    }

    #[tokio::test]
    async fn test_weights_load_runs_off_the_async_thread() {
        let provider = ThreadRecordingProvider {
            threads: std::sync::Mutex::new(Vec::new()),
        };
        let qa = RelationshipQa::new(resolvable(), BetweenPattern, WeightsCache::new(provider, 300));
        let out = qa.answer(QUESTION).await;
        assert_eq!(out.weights.version, "builtin-default");

        let threads = qa.weights.provider().threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn test_response_serializes_status_in_screaming_case() {
        let out = qa(resolvable()).answer(QUESTION).await;
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["status"], "NO_PATH");
        assert!(json["evidence"].is_null());
        assert_eq!(json["weights"]["version"], "builtin-default");

        let best_x = &json["resolved_candidates"]["x"][0];
        assert_eq!(best_x["label"], "Asset Information");
        assert!(best_x.get("type").is_some());
        assert!(best_x.get("matchRank").is_none());
        assert!(best_x.get("match_rank").is_none());
        assert!(best_x.get("score").is_none());
    }
}
