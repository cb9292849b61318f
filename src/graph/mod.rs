//! Knowledge graph access: domain types, the read-only store contract,
//! the SQLite store, and the constrained shortest-path BFS.

mod display_name;
pub(crate) mod store;
mod traversal;

pub use display_name::{DisplayField, DisplayNamePolicy, EntityNames};
pub use store::{GraphStore, SqliteGraphStore};
pub use traversal::{all_shortest_paths, Adjacent, Route};

use serde::Serialize;

use crate::error::{KgpathError, Result};

/// An entity whose display name contains a search term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub label: String,
    /// 3 = exact, 2 = prefix, 1 = contains (case-insensitive). Ranking
    /// input only, not part of the response.
    #[serde(skip_serializing)]
    pub match_rank: u8,
}

/// A node on a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    /// Keys of the entity's stored properties, used for property bonuses.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_keys: Vec<String>,
}

/// A typed edge on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEdge {
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Whether this particular relation instance is flagged canonical.
    pub canonical: bool,
}

/// An alternating node/edge sequence. Always holds
/// `edges.len() == nodes.len() - 1` and `hop_count == edges.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chain {
    hop_count: usize,
    nodes: Vec<PathNode>,
    edges: Vec<PathEdge>,
}

impl Chain {
    pub fn new(nodes: Vec<PathNode>, edges: Vec<PathEdge>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(KgpathError::InvalidInput("chain has no nodes".to_string()));
        }
        if edges.len() + 1 != nodes.len() {
            return Err(KgpathError::InvalidInput(format!(
                "chain has {} nodes but {} edges",
                nodes.len(),
                edges.len()
            )));
        }
        Ok(Self {
            hop_count: edges.len(),
            nodes,
            edges,
        })
    }

    pub fn hop_count(&self) -> usize {
        self.hop_count
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[PathEdge] {
        &self.edges
    }

    pub fn edge_types(&self) -> Vec<&str> {
        self.edges.iter().map(|e| e.relation_type.as_str()).collect()
    }

    /// True when every edge type is in `allowed`.
    pub fn uses_only(&self, allowed: &[String]) -> bool {
        self.edges
            .iter()
            .all(|e| allowed.iter().any(|a| a == &e.relation_type))
    }
}

#[cfg(test)]
pub(crate) fn test_node(id: &str, node_type: &str) -> PathNode {
    PathNode {
        id: id.to_string(),
        node_type: node_type.to_string(),
        label: id.to_uppercase(),
        property_keys: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn test_edge(relation_type: &str) -> PathEdge {
    PathEdge {
        relation_type: relation_type.to_string(),
        canonical: false,
    }
}
