// src/graph/validate.rs

//! Structural checks over a story graph.
//!
//! Every check reports independently, so one bad node key does not hide a
//! dangling edge or a cycle further down. Results are advisory for
//! scheduling and decisive for the `validate` subcommand.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::LazyLock;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::fs::FileSystem;
use crate::graph::loader::{discover_graphs, graph_path, parse_graph_document};
use crate::graph::model::{RawGraph, normalize_key};

/// Canonical node key: a letter prefix followed by at least two digits.
static NODE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+[0-9]{2,}$").expect("static regex"));

/// Validation result for one story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphReport {
    pub slug: String,
    pub errors: Vec<String>,
}

impl GraphReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Whether `key` (already normalised) has the canonical shape.
pub fn is_canonical_key(key: &str) -> bool {
    NODE_KEY_RE.is_match(key)
}

/// Validate the graph file of a single story.
pub fn validate_story(fs: &dyn FileSystem, graph_dir: &Path, slug: &str) -> GraphReport {
    let errors = match graph_path(fs, graph_dir, slug) {
        None => vec![format!(
            "graph file not found: {}",
            graph_dir.join(format!("{slug}.yaml")).display()
        )],
        Some(path) => match fs.read_to_string(&path) {
            Err(err) => vec![format!("cannot read {}: {err:#}", path.display())],
            Ok(text) => match parse_graph_document(&text) {
                Err(err) => vec![format!("cannot parse {}: {err}", path.display())],
                Ok(raw) => validate_raw(&raw),
            },
        },
    };
    GraphReport {
        slug: slug.to_string(),
        errors,
    }
}

/// Validate one story, or every graph found in `graph_dir`.
pub fn validate_all(
    fs: &dyn FileSystem,
    graph_dir: &Path,
    story: Option<&str>,
) -> crate::errors::Result<Vec<GraphReport>> {
    let slugs = match story {
        Some(slug) => vec![slug.to_string()],
        None => discover_graphs(fs, graph_dir)?,
    };
    Ok(slugs
        .iter()
        .map(|slug| validate_story(fs, graph_dir, slug))
        .collect())
}

/// Run every structural check over a parsed document.
pub fn validate_raw(raw: &RawGraph) -> Vec<String> {
    let mut errors = Vec::new();

    if raw.nodes.is_empty() {
        errors.push("graph declares no nodes".to_string());
    }

    check_key_format(raw, &mut errors);
    check_duplicates(raw, &mut errors);
    check_node_metadata(raw, &mut errors);

    let declared: BTreeSet<String> = raw.nodes.iter().map(|(k, _)| normalize_key(k)).collect();
    check_edges(raw, &declared, &mut errors);
    check_aliases(raw, &declared, &mut errors);
    if let Some(msg) = detect_cycle(raw, &declared) {
        errors.push(msg);
    }

    errors
}

fn check_key_format(raw: &RawGraph, errors: &mut Vec<String>) {
    for (key, _) in raw.nodes.iter() {
        let normalized = normalize_key(key);
        if !is_canonical_key(&normalized) {
            errors.push(format!(
                "node key '{key}' does not match the required format \
                 (letters followed by at least two digits)"
            ));
        }
    }
}

fn check_duplicates(raw: &RawGraph, errors: &mut Vec<String>) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (key, _) in raw.nodes.iter() {
        *counts.entry(normalize_key(key)).or_default() += 1;
    }
    for (key, count) in counts {
        if count > 1 {
            errors.push(format!("duplicate node key '{key}' declared {count} times"));
        }
    }
}

fn check_node_metadata(raw: &RawGraph, errors: &mut Vec<String>) {
    for (key, node) in raw.nodes.iter() {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        if blank(&node.title) {
            errors.push(format!("node '{key}' is missing a title"));
        }
        if blank(&node.kind) {
            errors.push(format!("node '{key}' is missing a kind"));
        }
    }
}

fn check_edges(raw: &RawGraph, declared: &BTreeSet<String>, errors: &mut Vec<String>) {
    for (idx, edge) in raw.edges.iter().enumerate() {
        if edge.len() != 2 {
            errors.push(format!(
                "edge #{} must have exactly two endpoints (got {})",
                idx + 1,
                edge.len()
            ));
            continue;
        }
        for endpoint in edge {
            if !declared.contains(&normalize_key(endpoint)) {
                errors.push(format!(
                    "edge {} -> {} references undeclared node '{endpoint}'",
                    edge[0], edge[1]
                ));
            }
        }
    }
}

fn check_aliases(raw: &RawGraph, declared: &BTreeSet<String>, errors: &mut Vec<String>) {
    for (key, _) in raw.task_id_map.iter() {
        if !declared.contains(&normalize_key(key)) {
            errors.push(format!("task_id_map references undeclared node '{key}'"));
        }
    }
}

/// Kahn's algorithm over declared nodes. Returns a diagnostic when some
/// nodes can never reach in-degree zero.
fn detect_cycle(raw: &RawGraph, declared: &BTreeSet<String>) -> Option<String> {
    let edges: BTreeSet<(String, String)> = raw
        .edges
        .iter()
        .filter(|e| e.len() == 2)
        .map(|e| (normalize_key(&e[0]), normalize_key(&e[1])))
        .filter(|(p, c)| declared.contains(p) && declared.contains(c))
        .collect();

    let mut indegree: BTreeMap<&str, usize> = declared.iter().map(|k| (k.as_str(), 0)).collect();
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (parent, child) in edges.iter() {
        *indegree.entry(child.as_str()).or_default() += 1;
        children.entry(parent.as_str()).or_default().push(child.as_str());
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut visited = 0usize;
    while let Some(node) = queue.pop_front() {
        visited += 1;
        for &child in children.get(node).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(child) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    let total = declared.len();
    if visited >= total {
        return None;
    }

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for key in declared.iter() {
        graph.add_node(key.as_str());
    }
    for (parent, child) in edges.iter() {
        graph.add_edge(parent.as_str(), child.as_str(), ());
    }
    let involving = match toposort(&graph, None) {
        Err(cycle) => format!(" (involving '{}')", cycle.node_id()),
        Ok(_) => String::new(),
    };

    Some(format!(
        "cycle detected: visited {visited} of {total} nodes{involving}"
    ))
}
