//! Cache-root selection for plugin expansion.

use std::path::PathBuf;

/// Configuration for selecting the on-disk plugin cache root.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// Override the plugin cache root directory.
    pub cache_root_override: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to determine home directory for default plugin cache path")]
pub struct MissingHomeDir;

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            cache_root_override: std::env::var_os("KEEL_PLUGIN_CACHE_DIR").map(PathBuf::from),
        }
    }

    /// Resolve the cache root: the override when set, otherwise
    /// `~/.keel/cache/plugins`.
    ///
    /// Each archive expands into its own basename-keyed subdirectory of this
    /// root; that partitioning is shared state across loader instances.
    pub fn cache_root(&self) -> Result<PathBuf, MissingHomeDir> {
        if let Some(root) = &self.cache_root_override {
            return Ok(root.clone());
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .ok_or(MissingHomeDir)?;
        Ok(home.join(".keel").join("cache").join("plugins"))
    }
}
