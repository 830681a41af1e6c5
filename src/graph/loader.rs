// src/graph/loader.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, StorydagError};
use crate::fs::FileSystem;
use crate::graph::fallback::parse_fallback;
use crate::graph::model::{GraphSpec, RawGraph, YamlGraphDoc};

const GRAPH_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Parse a graph document: YAML first, the fallback grammar second.
///
/// Returns the YAML error when both parsers fail, since that is usually the
/// more helpful message for a hand-edited file.
pub fn parse_graph_document(text: &str) -> Result<RawGraph> {
    match serde_yaml::from_str::<Option<YamlGraphDoc>>(text) {
        Ok(Some(doc)) => Ok(RawGraph::from(doc)),
        Ok(None) => Ok(RawGraph::default()),
        Err(yaml_err) => {
            debug!(error = %yaml_err, "YAML parse failed; trying fallback parser");
            match parse_fallback(text) {
                Ok(raw) => Ok(raw),
                Err(fallback_err) => {
                    debug!(error = %fallback_err, "fallback parser failed too");
                    Err(StorydagError::YamlError(yaml_err))
                }
            }
        }
    }
}

/// Path of the graph file for `slug`, if one exists (`.yaml` before `.yml`).
pub fn graph_path(fs: &dyn FileSystem, graph_dir: &Path, slug: &str) -> Option<PathBuf> {
    GRAPH_EXTENSIONS
        .iter()
        .map(|ext| graph_dir.join(format!("{slug}.{ext}")))
        .find(|p| fs.is_file(p))
}

/// Read and parse the raw graph of a story.
///
/// `Ok(None)` means no graph file exists.
pub fn load_raw(fs: &dyn FileSystem, graph_dir: &Path, slug: &str) -> Result<Option<RawGraph>> {
    let Some(path) = graph_path(fs, graph_dir, slug) else {
        return Ok(None);
    };
    let text = fs.read_to_string(&path)?;
    parse_graph_document(&text).map(Some)
}

/// Load the normalised graph of a story.
///
/// Never fails: a missing file and an unreadable or unparseable one both
/// yield `None`, meaning "no graph constraints apply" for this story.
pub fn load_graph(fs: &dyn FileSystem, graph_dir: &Path, slug: &str) -> Option<GraphSpec> {
    match load_raw(fs, graph_dir, slug) {
        Ok(Some(raw)) => {
            let spec = GraphSpec::from_raw(raw, slug);
            debug!(
                story = %slug,
                nodes = spec.nodes.len(),
                edges = spec.edges.len(),
                "loaded story graph"
            );
            Some(spec)
        }
        Ok(None) => {
            debug!(story = %slug, "no graph file; keeping task order");
            None
        }
        Err(err) => {
            warn!(story = %slug, error = %err, "graph file unusable; ignoring graph constraints");
            None
        }
    }
}

/// Story slugs of every graph file in `graph_dir`, sorted and de-duplicated.
pub fn discover_graphs(fs: &dyn FileSystem, graph_dir: &Path) -> Result<Vec<String>> {
    if !fs.is_dir(graph_dir) {
        return Ok(Vec::new());
    }
    let mut slugs: Vec<String> = fs
        .read_dir(graph_dir)?
        .into_iter()
        .filter(|p| fs.is_file(p))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| GRAPH_EXTENSIONS.contains(&e))
        })
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    slugs.sort();
    slugs.dedup();
    Ok(slugs)
}
