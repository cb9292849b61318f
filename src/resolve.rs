//! Term to entity resolution.
//!
//! The store does the fuzzy match; this module re-ranks what comes back using
//! type preference, noise penalties and label length so the most specific,
//! most useful entity ends up first.

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::graph::{Candidate, GraphStore};

/// A candidate with its resolver score. Higher is better. Only the
/// candidate itself is serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(skip_serializing)]
    pub score: i64,
}

/// Score one candidate.
///
/// `match_rank * 1000` dominates; type preference, penalties and the short
/// label bonus only reorder candidates within the same match rank.
pub fn score_candidate(candidate: &Candidate, question_mentions_list: bool, config: &ResolverConfig) -> i64 {
    let mut score = i64::from(candidate.match_rank) * 1000;
    score += type_preference(&candidate.entity_type, &config.type_preference);

    if !question_mentions_list {
        let label = candidate.label.to_lowercase();
        for noise in &config.noise_patterns {
            if !noise.pattern.is_empty() && label.contains(&noise.pattern.to_lowercase()) {
                score -= noise.penalty;
            }
        }
    }

    if let Some(penalty) = config.type_penalties.get(&candidate.entity_type) {
        score -= penalty;
    }

    let threshold = config.long_label_threshold;
    let len = candidate.label.chars().count().min(threshold);
    score += i64::try_from(threshold - len).unwrap_or(0);

    score
}

/// `100 - 10 * position` for listed types, 0 otherwise.
fn type_preference(entity_type: &str, preference: &[String]) -> i64 {
    preference
        .iter()
        .position(|t| t == entity_type)
        .map(|i| 100 - 10 * i64::try_from(i).unwrap_or(i64::MAX / 10))
        .unwrap_or(0)
}

/// Re-rank raw matches, best first, keeping at most `config.max_candidates`.
/// Equal scores keep the store's order.
pub fn rank_candidates(
    raw: Vec<Candidate>,
    question_mentions_list: bool,
    config: &ResolverConfig,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = raw
        .into_iter()
        .map(|candidate| {
            let score = score_candidate(&candidate, question_mentions_list, config);
            RankedCandidate { candidate, score }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(config.max_candidates);
    ranked
}

/// Look up `term` in the store and rank the matches. An empty result means
/// the term did not resolve.
pub async fn resolve<S: GraphStore>(
    store: &S,
    term: &str,
    question_mentions_list: bool,
    config: &ResolverConfig,
) -> Result<Vec<RankedCandidate>> {
    let raw = store.find_candidates(term, config.max_raw_matches).await?;
    let ranked = rank_candidates(raw, question_mentions_list, config);
    match ranked.first() {
        Some(best) => log::debug!(
            "Resolved {:?} to {} ({}) score {} of {} candidates",
            term,
            best.candidate.id,
            best.candidate.label,
            best.score,
            ranked.len()
        ),
        None => log::info!("No candidates for {:?}", term),
    }
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::tests::{insert_entity, migrated_db};
    use crate::graph::SqliteGraphStore;

    fn candidate(id: &str, entity_type: &str, label: &str, match_rank: u8) -> Candidate {
        Candidate {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            label: label.to_string(),
            match_rank,
        }
    }

    #[test]
    fn test_score_components() {
        let config = ResolverConfig::default();
        // 3000 + 80 (Construct) + (50 - 4)
        assert_eq!(score_candidate(&candidate("1", "Construct", "Goal", 3), false, &config), 3126);
        // unknown type, label over the threshold
        let long = "x".repeat(80);
        assert_eq!(score_candidate(&candidate("2", "Other", &long, 1), false, &config), 1000);
        // Deliverable: 1000 + 40 - 150 + (50 - 6)
        assert_eq!(score_candidate(&candidate("3", "Deliverable", "Report", 1), false, &config), 934);
    }

    #[test]
    fn test_noise_penalty_skipped_when_list_requested() {
        let config = ResolverConfig::default();
        let c = candidate("1", "Content", "Uniclass Greek List", 2);
        let penalised = score_candidate(&c, false, &config);
        let plain = score_candidate(&c, true, &config);
        assert_eq!(plain - penalised, 250 + 200);
    }

    #[test]
    fn test_match_rank_dominates() {
        let config = ResolverConfig::default();
        let raw = vec![
            candidate("contains", "InformationUse", "Asset information", 1),
            candidate("exact", "Content", "information list with a very long and unhelpful label", 3),
        ];
        let ranked = rank_candidates(raw, false, &config);
        assert_eq!(ranked[0].candidate.id, "exact");
    }

    #[test]
    fn test_preferred_type_wins_within_rank() {
        let config = ResolverConfig::default();
        let raw = vec![
            candidate("content", "Content", "Design", 3),
            candidate("use", "InformationUse", "Design", 3),
            candidate("construct", "Construct", "Design", 3),
        ];
        let ids: Vec<_> = rank_candidates(raw, false, &config)
            .into_iter()
            .map(|r| r.candidate.id)
            .collect();
        assert_eq!(ids, vec!["use", "construct", "content"]);
    }

    #[test]
    fn test_truncates_and_is_stable() {
        let config = ResolverConfig::default();
        let raw: Vec<_> = (0..8).map(|i| candidate(&format!("c{}", i), "Content", "Same", 1)).collect();
        let first = rank_candidates(raw.clone(), false, &config);
        let second = rank_candidates(raw, false, &config);
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        let ids: Vec<_> = first.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn test_empty_input_stays_empty() {
        assert!(rank_candidates(Vec::new(), false, &ResolverConfig::default()).is_empty());
    }

    #[tokio::test]
    async fn test_resolves_against_sqlite_store() {
        let (db, _temp) = migrated_db().await;
        insert_entity(&db, "d1", "Deliverable", "BIM Execution Plan", None).await;
        insert_entity(&db, "c1", "Construct", "BIM Execution Plan", None).await;
        insert_entity(&db, "x1", "Content", "Greek BIM glossary", None).await;
        let store = SqliteGraphStore::new(db);
        let config = ResolverConfig::default();

        let ranked = resolve(&store, "bim execution plan", false, &config).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].candidate.id, "c1");
        assert_eq!(ranked[0].candidate.match_rank, 3);

        let again = resolve(&store, "bim execution plan", false, &config).await.unwrap();
        assert_eq!(ranked, again);

        assert!(resolve(&store, "nothing like this", false, &config).await.unwrap().is_empty());
    }
}
