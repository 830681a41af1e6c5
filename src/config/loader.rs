// src/config/loader.rs

use std::path::Path;

use tracing::debug;

use crate::config::model::{CONFIG_FILE_NAME, ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;

/// Parse a configuration document and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn parse_raw(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let contents = fs.read_to_string(path.as_ref())?;
    let raw = parse_raw(&contents)?;
    ConfigFile::try_from(raw)
}

/// Load `storydag.toml` from the project root, or defaults when it is absent.
pub fn load_for_project(fs: &dyn FileSystem, project_root: &Path) -> Result<ConfigFile> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if !fs.is_file(&path) {
        debug!(path = %path.display(), "no project config; using defaults");
        return Ok(ConfigFile::default());
    }
    debug!(path = %path.display(), "loading project config");
    load_and_validate(fs, &path)
}
