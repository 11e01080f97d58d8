use std::path::Path;

use serde::Deserialize;
use voyage_core::{ImportError, Result};

use crate::pipeline::sequence::DEFAULT_ALL_ABOARD_BUFFER_MINUTES;

/// Importer settings, loaded from a TOML file when one is given and
/// falling back to defaults otherwise. Every field has a default so a
/// partial file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Directory the content-addressed asset store writes under.
    pub assets_dir: String,
    /// URL prefix that marks an image reference as already internal.
    pub internal_asset_prefix: String,
    /// Minutes before departure that all-aboard is set to.
    pub all_aboard_buffer_minutes: i64,
    /// Retries per asset fetch before the batch is abandoned.
    pub asset_fetch_retries: u32,
    /// Concurrent asset transfer workers.
    pub asset_fetch_workers: usize,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            assets_dir: "assets".to_string(),
            internal_asset_prefix: "/assets".to_string(),
            all_aboard_buffer_minutes: DEFAULT_ALL_ABOARD_BUFFER_MINUTES,
            asset_fetch_retries: 2,
            asset_fetch_workers: 4,
        }
    }
}

impl ImporterConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| ImportError::Source(format!("bad config {}: {}", path.display(), e)))
    }

    /// Read `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = ImporterConfig::default();
        assert_eq!(cfg.all_aboard_buffer_minutes, 30);
        assert_eq!(cfg.internal_asset_prefix, "/assets");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ImporterConfig = toml::from_str("all_aboard_buffer_minutes = 45").unwrap();
        assert_eq!(cfg.all_aboard_buffer_minutes, 45);
        assert_eq!(cfg.assets_dir, "assets");
    }
}
