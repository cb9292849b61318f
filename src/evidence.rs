//! Evidence record for the best chains of a response.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use crate::error::{KgpathError, Result};
use crate::scoring::ScoredChain;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub relation: String,
    pub target: String,
}

/// Nodes from every chain (first occurrence wins), edges from the top chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Headline numbers, all taken from the top chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceMetrics {
    /// Normalized score on a 0-10 scale, one decimal.
    pub score: f64,
    pub confidence: String,
    pub hops: usize,
    pub raw: f64,
    pub normalised: f64,
    pub decay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRecord {
    pub summary: String,
    pub graph: GraphData,
    pub metrics: EvidenceMetrics,
    pub shown: Vec<ScoredChain>,
    pub text: String,
}

/// What the renderer needs besides the chains.
#[derive(Debug, Clone, Default)]
pub struct EvidenceContext<'a> {
    pub label_x: &'a str,
    pub label_y: &'a str,
    pub weights_version: Option<&'a str>,
    pub weights_updated_utc: Option<&'a str>,
}

/// Build the evidence record from chains already sorted best first.
///
/// The summary counts every chain; only the first `display_limit` (at least
/// one) are shown.
pub fn render(chains: &[ScoredChain], display_limit: usize, ctx: &EvidenceContext<'_>) -> Result<EvidenceRecord> {
    let graph = graph_data(chains);
    if graph.nodes.is_empty() {
        return Err(KgpathError::Evidence("no nodes to show".to_string()));
    }
    let Some(top) = chains.first() else {
        return Err(KgpathError::Evidence("no chains to show".to_string()));
    };

    let metrics = EvidenceMetrics {
        score: score_out_of_ten(top.score_norm),
        confidence: top.tier.confidence_label().to_string(),
        hops: top.hop_count(),
        raw: top.score_raw,
        normalised: top.score_norm,
        decay: top.score_components.decay_multiplier,
    };

    let shown: Vec<ScoredChain> = chains.iter().take(display_limit.max(1)).cloned().collect();
    let text = render_text(&shown, ctx);

    Ok(EvidenceRecord {
        summary: summary(chains.len(), ctx.label_x, ctx.label_y),
        graph,
        metrics,
        shown,
        text,
    })
}

pub fn summary(count: usize, label_x: &str, label_y: &str) -> String {
    format!("Found {} path(s) between \"{}\" and \"{}\".", count, label_x, label_y)
}

fn score_out_of_ten(score_norm: f64) -> f64 {
    if score_norm.is_finite() {
        (score_norm * 100.0).round() / 10.0
    } else {
        0.0
    }
}

fn graph_data(chains: &[ScoredChain]) -> GraphData {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for chain in chains {
        for node in chain.chain.nodes() {
            if node.id.is_empty() || !seen.insert(node.id.as_str()) {
                continue;
            }
            nodes.push(GraphNode {
                id: node.id.clone(),
                node_type: if node.node_type.is_empty() {
                    "Unknown".to_string()
                } else {
                    node.node_type.clone()
                },
                label: if node.label.is_empty() {
                    node.id.clone()
                } else {
                    node.label.clone()
                },
            });
        }
    }

    let edges = chains
        .first()
        .map(|top| {
            let nodes = top.chain.nodes();
            top.chain
                .edges()
                .iter()
                .enumerate()
                .map(|(i, edge)| GraphEdge {
                    source: nodes[i].id.clone(),
                    relation: edge.relation_type.clone(),
                    target: nodes[i + 1].id.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    GraphData { nodes, edges }
}

fn render_text(shown: &[ScoredChain], ctx: &EvidenceContext<'_>) -> String {
    let mut out = String::new();
    for (i, scored) in shown.iter().enumerate() {
        let c = &scored.score_components;
        let _ = writeln!(
            out,
            "Path {}: {} hops | {} | {:.1} {}",
            i + 1,
            scored.hop_count(),
            scored.tier.as_str(),
            score_out_of_ten(scored.score_norm),
            scored.tier.evidence_label()
        );
        let _ = writeln!(out, "  {}", chain_line(scored));
        let _ = writeln!(
            out,
            "  raw {}  normalised {}  hops {}  decay {}",
            fmt_num(scored.score_raw),
            fmt_num(scored.score_norm),
            c.hop_count,
            fmt_num(c.decay_multiplier)
        );
        let _ = writeln!(
            out,
            "  Σnodes {}  Σedges {}  Σattrs {}  Σedge bonus {}",
            fmt_num(c.sum_node_weight),
            fmt_num(c.sum_edge_weight),
            fmt_num(c.sum_property_bonus),
            fmt_num(c.sum_edge_bonus)
        );
    }

    if let Some(version) = ctx.weights_version.filter(|v| !v.is_empty()) {
        let updated = ctx.weights_updated_utc.map(pretty_date).unwrap_or_default();
        let _ = writeln!(out, "Semantic Evidence Weights {}, updated {}", version, updated);
    }
    out
}

/// `Label [Type] -REL-> Label [Type] ...`
fn chain_line(scored: &ScoredChain) -> String {
    let nodes = scored.chain.nodes();
    let edges = scored.chain.edges();
    let mut line = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let label = if node.label.is_empty() { "(unnamed)" } else { &node.label };
        let _ = write!(line, "{} [{}]", label, node.node_type);
        if let Some(edge) = edges.get(i) {
            let _ = write!(line, " -{}-> ", edge.relation_type);
        }
    }
    line
}

/// Three decimals with trailing zeros dropped; non-finite prints as `0`.
fn fmt_num(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    let s = format!("{:.3}", n);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `2026-01-06T10:00:00Z` -> `06 Jan 2026`. Unparseable input is returned as is.
pub fn pretty_date(iso: &str) -> String {
    if iso.is_empty() {
        return String::new();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return dt.naive_utc().format("%d %b %Y").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        return date.format("%d %b %Y").to_string();
    }
    iso.to_string()
}
