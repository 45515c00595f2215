//! Configuration file discovery and loading

use super::catalint_config::CatalintConfig;
use crate::error::CatalintError;
use crate::result::Result;
use std::path::{Path, PathBuf};

/// Config file names, in priority order
const CONFIG_FILE_NAMES: &[&str] = &[
    ".catalintrc.toml",
    ".catalintrc.json",
    ".catalintrc",
    "catalint.toml",
    "catalint.yaml",
    "catalint.yml",
    "catalint.json",
];

/// Configuration loader for discovering and loading config files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Auto-discover a config file by traversing upward from `start_path`.
    ///
    /// Checks each directory for the names in `CONFIG_FILE_NAMES` until one
    /// exists or the filesystem root is reached.
    pub fn auto_discover(start_path: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_path
            .canonicalize()
            .map_err(|e| CatalintError::config_error(format!("Invalid path: {e}")))?;
        if current.is_file() {
            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            }
        }

        loop {
            for filename in CONFIG_FILE_NAMES {
                let config_path = current.join(filename);
                if config_path.is_file() {
                    tracing::debug!("Found config: {}", config_path.display());
                    return Ok(Some(config_path));
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from a specific file, resolving relative paths
    /// against the file's directory
    pub fn load_from_file(path: &Path) -> Result<CatalintConfig> {
        let config = CatalintConfig::load(path).map_err(|e| {
            CatalintError::config_error(format!(
                "Failed to load config from '{}': {}",
                path.display(),
                e
            ))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolve_paths(base))
    }

    /// Load config from an explicit path or auto-discover it.
    ///
    /// An explicit path must exist. When nothing is discovered the default
    /// (empty) configuration is returned.
    pub fn load(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<CatalintConfig> {
        if let Some(path) = custom_path {
            if !path.exists() {
                return Err(CatalintError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::load_from_file(path);
        }

        let search_dir = start_dir.unwrap_or_else(|| Path::new("."));
        match Self::auto_discover(search_dir)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(CatalintConfig::default())
            }
        }
    }
}
