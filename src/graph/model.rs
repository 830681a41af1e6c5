// src/graph/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::types::{GateName, NodeKey, NodeKind};

/// One node entry exactly as written in the graph file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// `policies:` block of a graph file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawPolicies {
    #[serde(default)]
    pub ready_requires: Vec<String>,
}

/// Graph document before normalisation.
///
/// Node entries are kept as an ordered list with their original keys so the
/// validator can see duplicates and ill-formed keys. Both the YAML parser and
/// the fallback line parser produce this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGraph {
    pub story: Option<String>,
    pub nodes: Vec<(String, RawNode)>,
    pub edges: Vec<Vec<String>>,
    pub policies: RawPolicies,
    pub task_id_map: Vec<(String, Vec<String>)>,
}

/// Serde shape of a graph file for the primary (YAML) parser.
#[derive(Debug, Deserialize)]
pub(crate) struct YamlGraphDoc {
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default, deserialize_with = "ordered_entries")]
    pub nodes: Option<Vec<(String, Option<RawNode>)>>,
    #[serde(default)]
    pub edges: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub policies: Option<RawPolicies>,
    #[serde(default, deserialize_with = "ordered_entries")]
    pub task_id_map: Option<Vec<(String, Vec<String>)>>,
}

/// Deserialize a mapping as an ordered entry list so repeated keys survive
/// for the validator instead of silently overwriting each other.
fn ordered_entries<'de, D, V>(de: D) -> Result<Option<Vec<(String, V)>>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Option<Vec<(String, V)>>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                out.push((key, value));
            }
            Ok(Some(out))
        }
    }

    de.deserialize_any(EntriesVisitor(PhantomData))
}

impl From<YamlGraphDoc> for RawGraph {
    fn from(doc: YamlGraphDoc) -> Self {
        RawGraph {
            story: doc.story,
            nodes: doc
                .nodes
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or_default()))
                .collect(),
            edges: doc.edges.unwrap_or_default(),
            policies: doc.policies.unwrap_or_default(),
            task_id_map: doc.task_id_map.unwrap_or_default(),
        }
    }
}

/// Metadata of a single graph node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub title: String,
    pub kind: NodeKind,
}

/// Normalised per-story dependency graph.
///
/// Invariants (established by [`GraphSpec::from_raw`]):
/// - node keys are upper-cased and unique;
/// - every edge endpoint is a declared node;
/// - alias task ids are lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSpec {
    pub story_id: String,
    pub nodes: BTreeMap<NodeKey, NodeMeta>,
    pub edges: Vec<(NodeKey, NodeKey)>,
    pub ready_requires: Vec<GateName>,
    pub alias_map: BTreeMap<NodeKey, Vec<String>>,
}

impl GraphSpec {
    /// Normalise a raw document. Malformed pieces are dropped with a warning
    /// rather than rejected; the validator is where they get reported.
    pub fn from_raw(raw: RawGraph, slug: &str) -> Self {
        let story_id = raw
            .story
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(slug)
            .to_string();

        let mut nodes = BTreeMap::new();
        for (key, node) in raw.nodes {
            let key = normalize_key(&key);
            if key.is_empty() {
                warn!(story = %slug, "dropping node with empty key");
                continue;
            }
            if nodes.contains_key(&key) {
                warn!(story = %slug, node = %key, "duplicate node key; keeping first");
                continue;
            }
            let title = node.title.unwrap_or_default().trim().to_string();
            let kind = NodeKind::parse(node.kind.as_deref().unwrap_or_default());
            nodes.insert(key, NodeMeta { title, kind });
        }

        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();
        for edge in raw.edges {
            let [parent, child] = edge.as_slice() else {
                warn!(story = %slug, ?edge, "dropping edge without exactly two endpoints");
                continue;
            };
            let (parent, child) = (normalize_key(parent), normalize_key(child));
            if !nodes.contains_key(&parent) || !nodes.contains_key(&child) {
                warn!(story = %slug, %parent, %child, "dropping edge with undeclared endpoint");
                continue;
            }
            if seen.insert((parent.clone(), child.clone())) {
                edges.push((parent, child));
            }
        }

        let mut ready_requires: Vec<GateName> = Vec::new();
        for gate in raw.policies.ready_requires {
            let gate = gate.trim().to_string();
            if !gate.is_empty() && !ready_requires.contains(&gate) {
                ready_requires.push(gate);
            }
        }

        let mut alias_map: BTreeMap<NodeKey, Vec<String>> = BTreeMap::new();
        for (key, ids) in raw.task_id_map {
            let entry = alias_map.entry(normalize_key(&key)).or_default();
            for id in ids {
                let id = id.trim().to_lowercase();
                if !id.is_empty() && !entry.contains(&id) {
                    entry.push(id);
                }
            }
        }

        GraphSpec {
            story_id,
            nodes,
            edges,
            ready_requires,
            alias_map,
        }
    }

    pub fn node(&self, key: &str) -> Option<&NodeMeta> {
        self.nodes.get(key)
    }

    /// Lower-cased legacy task ids that bind to `key`.
    pub fn aliases_of(&self, key: &str) -> &[String] {
        self.alias_map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Upper-case and trim a node key.
pub fn normalize_key(key: &str) -> NodeKey {
    key.trim().to_uppercase()
}
