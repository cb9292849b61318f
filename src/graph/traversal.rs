//! Layered BFS that enumerates every shortest route between two entities.

use std::collections::HashMap;

use crate::error::Result;
use crate::graph::PathEdge;

/// One edge leaving (or entering) the node being expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjacent {
    pub neighbor: String,
    pub edge: PathEdge,
}

/// Node ids and edges of one route, source first.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub node_ids: Vec<String>,
    pub edges: Vec<PathEdge>,
}

/// Find up to `limit` shortest routes from `source` to `target` of at most
/// `max_hops` edges. `neighbors` is asked once per expanded node; its order
/// decides which routes win when more than `limit` tie.
pub fn all_shortest_paths<F>(
    source: &str,
    target: &str,
    max_hops: usize,
    limit: usize,
    mut neighbors: F,
) -> Result<Vec<Route>>
where
    F: FnMut(&str) -> Result<Vec<Adjacent>>,
{
    if limit == 0 || max_hops == 0 || source == target {
        return Ok(Vec::new());
    }

    let mut depth: HashMap<String, usize> = HashMap::new();
    let mut preds: HashMap<String, Vec<(String, PathEdge)>> = HashMap::new();
    let mut frontier = vec![source.to_string()];
    depth.insert(source.to_string(), 0);

    for level in 0..max_hops {
        let mut next = Vec::new();
        for node in &frontier {
            for adj in neighbors(node)? {
                if adj.neighbor == *node {
                    continue;
                }
                match depth.get(&adj.neighbor).copied() {
                    None => {
                        depth.insert(adj.neighbor.clone(), level + 1);
                        preds
                            .entry(adj.neighbor.clone())
                            .or_default()
                            .push((node.clone(), adj.edge));
                        next.push(adj.neighbor);
                    }
                    Some(d) if d == level + 1 => {
                        preds
                            .entry(adj.neighbor)
                            .or_default()
                            .push((node.clone(), adj.edge));
                    }
                    Some(_) => {}
                }
            }
        }

        if depth.contains_key(target) || next.is_empty() {
            break;
        }
        frontier = next;
    }

    if !depth.contains_key(target) {
        return Ok(Vec::new());
    }

    let mut routes = Vec::new();
    let mut nodes_rev = vec![target.to_string()];
    let mut edges_rev = Vec::new();
    unwind(source, target, &preds, &mut nodes_rev, &mut edges_rev, &mut routes, limit);
    Ok(routes)
}

/// Walk predecessor lists from `node` back to `source`, emitting one route per
/// complete walk.
fn unwind(
    source: &str,
    node: &str,
    preds: &HashMap<String, Vec<(String, PathEdge)>>,
    nodes_rev: &mut Vec<String>,
    edges_rev: &mut Vec<PathEdge>,
    routes: &mut Vec<Route>,
    limit: usize,
) {
    if routes.len() >= limit {
        return;
    }
    if node == source {
        routes.push(Route {
            node_ids: nodes_rev.iter().rev().cloned().collect(),
            edges: edges_rev.iter().rev().cloned().collect(),
        });
        return;
    }
    let Some(incoming) = preds.get(node) else {
        return;
    };
    for (prev, edge) in incoming {
        nodes_rev.push(prev.clone());
        edges_rev.push(edge.clone());
        unwind(source, prev, preds, nodes_rev, edges_rev, routes, limit);
        nodes_rev.pop();
        edges_rev.pop();
        if routes.len() >= limit {
            return;
        }
    }
}
