#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rusqlite::params;

use storydag::graph::{GraphSpec, RawGraph, RawNode};
use storydag::store::{TaskRecord, TaskStore};

/// Builder for story graphs. Produces either a normalised [`GraphSpec`] or
/// the equivalent YAML document for on-disk tests.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    slug: String,
    raw: RawGraph,
}

impl GraphBuilder {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            raw: RawGraph {
                story: Some(slug.to_string()),
                ..RawGraph::default()
            },
        }
    }

    pub fn node(mut self, key: &str, kind: &str, title: &str) -> Self {
        self.raw.nodes.push((
            key.to_string(),
            RawNode {
                title: Some(title.to_string()),
                kind: Some(kind.to_string()),
            },
        ));
        self
    }

    pub fn edge(mut self, parent: &str, child: &str) -> Self {
        self.raw.edges.push(vec![parent.to_string(), child.to_string()]);
        self
    }

    pub fn requires(mut self, gate: &str) -> Self {
        self.raw.policies.ready_requires.push(gate.to_string());
        self
    }

    pub fn alias(mut self, key: &str, task_id: &str) -> Self {
        match self.raw.task_id_map.iter_mut().find(|(k, _)| k == key) {
            Some((_, ids)) => ids.push(task_id.to_string()),
            None => self
                .raw
                .task_id_map
                .push((key.to_string(), vec![task_id.to_string()])),
        }
        self
    }

    pub fn raw(&self) -> RawGraph {
        self.raw.clone()
    }

    pub fn build(self) -> GraphSpec {
        GraphSpec::from_raw(self.raw, &self.slug)
    }

    /// YAML rendering of the graph, in the on-disk layout.
    pub fn to_yaml(&self) -> String {
        let mut out = format!("story: {}\nnodes:\n", self.slug);
        for (key, node) in self.raw.nodes.iter() {
            out.push_str(&format!("  {key}:\n"));
            if let Some(title) = node.title.as_deref() {
                out.push_str(&format!("    title: \"{title}\"\n"));
            }
            if let Some(kind) = node.kind.as_deref() {
                out.push_str(&format!("    kind: {kind}\n"));
            }
        }
        out.push_str("edges:\n");
        for edge in self.raw.edges.iter() {
            out.push_str(&format!("  - [{}]\n", edge.join(", ")));
        }
        if !self.raw.policies.ready_requires.is_empty() {
            out.push_str("policies:\n  ready_requires:\n");
            for gate in self.raw.policies.ready_requires.iter() {
                out.push_str(&format!("    - {gate}\n"));
            }
        }
        if !self.raw.task_id_map.is_empty() {
            out.push_str("task_id_map:\n");
            for (key, ids) in self.raw.task_id_map.iter() {
                out.push_str(&format!("  {key}: [{}]\n", ids.join(", ")));
            }
        }
        out
    }
}

/// In-memory task record for pure scheduler tests.
pub fn task(id: i64, position: i64, task_id: &str, status: &str) -> TaskRecord {
    TaskRecord {
        id,
        story_slug: "story".to_string(),
        position,
        task_id: Some(task_id.to_string()),
        title: format!("task {task_id}"),
        status: status.to_string(),
        status_reason: None,
        started_at: None,
        completed_at: None,
    }
}

/// Tasks `ids[i]` at position `i + 1`, all pending.
pub fn pending_tasks(ids: &[&str]) -> Vec<TaskRecord> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| task(idx as i64 + 1, idx as i64 + 1, id, "pending"))
        .collect()
}

/// Fixed clock for deterministic timestamps.
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// Seeds a task store with stories and task rows.
pub struct StoreBuilder {
    store: TaskStore,
}

impl StoreBuilder {
    /// In-memory store with the schema installed.
    pub fn in_memory() -> Self {
        Self {
            store: TaskStore::open_in_memory().expect("in-memory store"),
        }
    }

    /// On-disk store with the schema installed.
    pub fn at(path: &std::path::Path) -> Self {
        let store = TaskStore::open(path).expect("open store");
        store.ensure_schema().expect("schema");
        Self { store }
    }

    pub fn story(self, slug: &str, story_id: Option<&str>, sequence: i64) -> Self {
        self.store
            .connection()
            .execute(
                "INSERT INTO stories (slug, story_id, title, epic_key, epic_title, sequence) \
                 VALUES (?1, ?2, ?3, 'E1', 'Epic one', ?4)",
                params![slug, story_id, format!("Story {slug}"), sequence],
            )
            .expect("insert story");
        self
    }

    pub fn task(self, slug: &str, position: i64, task_id: &str, status: &str) -> Self {
        self.task_with_reason(slug, position, task_id, status, None)
    }

    pub fn task_with_reason(
        self,
        slug: &str,
        position: i64,
        task_id: &str,
        status: &str,
        reason: Option<&str>,
    ) -> Self {
        self.store
            .connection()
            .execute(
                "INSERT INTO tasks (story_slug, position, task_id, title, status, status_reason) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![slug, position, task_id, format!("Task {task_id}"), status, reason],
            )
            .expect("insert task");
        self
    }

    pub fn build(self) -> TaskStore {
        self.store
    }
}
