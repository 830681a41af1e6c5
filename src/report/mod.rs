// src/report/mod.rs

//! Read-only views over an already scheduled store.
//!
//! Nothing here writes: stray rows are read through
//! [`TaskStore::peek_tasks_for_story`](crate::store::TaskStore::peek_tasks_for_story).

pub mod explain;
pub mod ready;

pub use explain::{TaskExplanation, explain, resolve_task};
pub use ready::{StoryReadiness, list_ready};
