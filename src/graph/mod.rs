// src/graph/mod.rs

//! Story dependency graphs.
//!
//! - [`model`] holds the raw document and the normalised [`GraphSpec`].
//! - [`loader`] finds and parses `<slug>.yaml`, degrading to "no graph".
//! - [`fallback`] is the small line grammar used when YAML parsing fails.
//! - [`validate`] runs the structural checks behind `storydag validate`.

pub mod fallback;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{discover_graphs, graph_path, load_graph, parse_graph_document};
pub use model::{GraphSpec, NodeMeta, RawGraph, RawNode, normalize_key};
pub use validate::{GraphReport, validate_all, validate_raw, validate_story};
