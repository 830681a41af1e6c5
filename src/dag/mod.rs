// src/dag/mod.rs

//! Scheduler core.
//!
//! - [`status`] is the status/reason grammar, decoded into a tagged union.
//! - [`binding`] maps task rows onto graph nodes.
//! - [`graph`] holds adjacency, ancestor sets and the priority order.
//! - [`state_manager`] decides the write that brings one task up to date.
//! - [`scheduler`] runs a whole story and returns a [`SchedulePlan`].

pub mod binding;
pub mod graph;
pub mod plan;
pub mod scheduler;
pub mod state_manager;
pub mod status;

pub use binding::{Binding, BindingConflict, bind_tasks};
pub use graph::{DagGraph, NodeOrder, OrderKey};
pub use plan::SchedulePlan;
pub use scheduler::Scheduler;
pub use state_manager::StateManager;
pub use status::{Blockers, DAG_AUTO_MARKER, DoneSet, TaskStatus, explain_reason, is_auto_reason};
