// src/config/mod.rs

//! Project configuration for storydag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load `storydag.toml` from the project root (`loader.rs`).
//! - Validate basic invariants like a non-empty done set (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_for_project, parse_raw};
pub use model::{
    ApiContractGateSection, CONFIG_FILE_NAME, ConfigFile, GatesSection, PathsSection,
    RawConfigFile, SchemaGateSection, StatusSection,
};
pub use validate::validate_config;
