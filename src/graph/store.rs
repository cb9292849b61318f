//! Read-only graph store contract and its SQLite implementation.

use std::collections::HashMap;

use rusqlite::{params_from_iter, Connection};

use crate::db::Db;
use crate::error::{KgpathError, Result};
use crate::graph::{
    all_shortest_paths, Adjacent, Candidate, Chain, DisplayNamePolicy, EntityNames, PathEdge, PathNode,
};

/// Queries the pipeline needs from a property graph. Both are read-only.
#[allow(async_fn_in_trait)]
pub trait GraphStore {
    /// Entities whose display name contains `term` (case-insensitive), best
    /// match rank first, then shortest name.
    async fn find_candidates(&self, term: &str, limit: usize) -> Result<Vec<Candidate>>;

    /// Up to `limit` shortest chains of at most `max_hops` edges, traversing
    /// only relations whose type is in `allowed_types`.
    async fn shortest_paths(
        &self,
        source_id: &str,
        target_id: &str,
        max_hops: usize,
        allowed_types: &[String],
        limit: usize,
    ) -> Result<Vec<Chain>>;
}

/// Graph store over the `entities` / `entity_relations` tables.
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    db: Db,
    names: DisplayNamePolicy,
}

impl SqliteGraphStore {
    pub fn new(db: Db) -> Self {
        Self::with_names(db, DisplayNamePolicy::default())
    }

    pub fn with_names(db: Db, names: DisplayNamePolicy) -> Self {
        Self { db, names }
    }
}

impl GraphStore for SqliteGraphStore {
    async fn find_candidates(&self, term: &str, limit: usize) -> Result<Vec<Candidate>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // SQLite's lower() only folds ASCII, so matching happens here
        let query = format!(
            "SELECT entity_id, entity_type, display \
             FROM (SELECT entity_id, entity_type, {} AS display FROM entities) \
             WHERE display IS NOT NULL",
            self.names.sql_expr()
        );

        let start = std::time::Instant::now();
        let rows = self
            .db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(KgpathError::Database)?);
                }
                Ok(out)
            })
            .await?;
        let scanned = rows.len();

        let mut candidates: Vec<Candidate> = rows
            .into_iter()
            .filter_map(|(id, entity_type, label)| {
                let match_rank = match_rank(&label, &term)?;
                Some(Candidate {
                    id,
                    entity_type,
                    label,
                    match_rank,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.match_rank
                .cmp(&a.match_rank)
                .then_with(|| a.label.chars().count().cmp(&b.label.chars().count()))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(limit);

        log::debug!(
            "Candidate lookup matched {} of {} entities in {:?}",
            candidates.len(),
            scanned,
            start.elapsed()
        );
        Ok(candidates)
    }

    async fn shortest_paths(
        &self,
        source_id: &str,
        target_id: &str,
        max_hops: usize,
        allowed_types: &[String],
        limit: usize,
    ) -> Result<Vec<Chain>> {
        if allowed_types.is_empty() {
            return Ok(Vec::new());
        }

        let source = source_id.to_string();
        let target = target_id.to_string();
        let types = allowed_types.to_vec();
        let names = self.names.clone();

        self.db
            .with_connection(move |conn| {
                let routes = {
                    let placeholders = (0..types.len())
                        .map(|i| format!("?{}", i + 2))
                        .collect::<Vec<_>>()
                        .join(",");
                    let query = format!(
                        "SELECT source_entity, target_entity, relation_type, canonical \
                         FROM entity_relations \
                         WHERE (source_entity = ?1 OR target_entity = ?1) \
                           AND relation_type IN ({}) \
                         ORDER BY rowid",
                        placeholders
                    );
                    let mut stmt = conn.prepare(&query)?;
                    all_shortest_paths(&source, &target, max_hops, limit, |node| {
                        let bind = std::iter::once(node).chain(types.iter().map(String::as_str));
                        let rows = stmt.query_map(params_from_iter(bind), |row| {
                            let from: String = row.get(0)?;
                            let to: String = row.get(1)?;
                            Ok((from, to, row.get::<_, String>(2)?, row.get::<_, bool>(3)?))
                        })?;
                        let mut out = Vec::new();
                        for row in rows {
                            let (from, to, relation_type, canonical) = row?;
                            let neighbor = if from == node { to } else { from };
                            out.push(Adjacent {
                                neighbor,
                                edge: PathEdge { relation_type, canonical },
                            });
                        }
                        Ok(out)
                    })?
                };

                let mut chains = Vec::with_capacity(routes.len());
                let mut nodes_by_id: HashMap<String, PathNode> = HashMap::new();
                for route in routes {
                    let mut nodes = Vec::with_capacity(route.node_ids.len());
                    for id in &route.node_ids {
                        if !nodes_by_id.contains_key(id) {
                            let node = load_node(conn, &names, id)?;
                            nodes_by_id.insert(id.clone(), node);
                        }
                        if let Some(node) = nodes_by_id.get(id) {
                            nodes.push(node.clone());
                        }
                    }
                    chains.push(Chain::new(nodes, route.edges)?);
                }
                Ok(chains)
            })
            .await
    }
}

/// 3 for an exact match, 2 for a prefix, 1 for containment. `term` is
/// already lowercased.
fn match_rank(display: &str, term: &str) -> Option<u8> {
    let display = display.to_lowercase();
    if display == term {
        Some(3)
    } else if display.starts_with(term) {
        Some(2)
    } else if display.contains(term) {
        Some(1)
    } else {
        None
    }
}

/// Hydrate one chain node. Dangling ids still produce a node so the chain
/// stays well-formed.
fn load_node(conn: &Connection, names: &DisplayNamePolicy, id: &str) -> Result<PathNode> {
    let mut stmt = conn.prepare_cached(
        "SELECT entity_type, name, title, label, canonical_title, properties_json \
         FROM entities WHERE entity_id = ?1",
    )?;
    let mut rows = stmt.query([id])?;
    let Some(row) = rows.next()? else {
        log::warn!("Relation references missing entity {}", id);
        return Ok(PathNode {
            id: id.to_string(),
            node_type: "Unknown".to_string(),
            label: fallback_label(id),
            property_keys: Vec::new(),
        });
    };

    let node_type: String = row.get(0)?;
    let entity_names = EntityNames {
        name: row.get(1)?,
        title: row.get(2)?,
        label: row.get(3)?,
        canonical_title: row.get(4)?,
    };
    let properties_json: Option<String> = row.get(5)?;

    let label = names
        .pick(&entity_names)
        .map(String::from)
        .unwrap_or_else(|| fallback_label(id));

    Ok(PathNode {
        id: id.to_string(),
        node_type,
        label,
        property_keys: property_keys(id, properties_json.as_deref()),
    })
}

fn fallback_label(id: &str) -> String {
    if id.is_empty() {
        "(unnamed)".to_string()
    } else {
        id.to_string()
    }
}

fn property_keys(id: &str, properties_json: Option<&str>) -> Vec<String> {
    let Some(raw) = properties_json.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            log::warn!("Ignoring malformed properties_json on {}: {}", id, e);
            Vec::new()
        }
    }
}
