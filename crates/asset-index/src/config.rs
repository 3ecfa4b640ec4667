use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

pub const LIBRARY_CONFIG_VERSION: &str = "1";
pub const CONFIG_ENV_VAR: &str = "ASSET_INDEX_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryConfig {
    pub version: String,
    /// Where placeholder thumbnails are written.
    pub thumbnail_dir: PathBuf,
    pub thumbnails_enabled: bool,
    /// Roots to watch when the library starts.
    pub watch_roots: Vec<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            version: LIBRARY_CONFIG_VERSION.to_string(),
            thumbnail_dir: default_thumbnail_dir(),
            thumbnails_enabled: true,
            watch_roots: Vec::new(),
        }
    }
}

impl LibraryConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|error| {
            IndexError::Config(format!(
                "failed to read library config {}: {error}",
                path.display()
            ))
        })?;
        let config: LibraryConfig = serde_json::from_str(&data).map_err(|error| {
            IndexError::Config(format!(
                "failed to parse library config {}: {error}",
                path.display()
            ))
        })?;
        if config.version != LIBRARY_CONFIG_VERSION {
            return Err(IndexError::Config(format!(
                "unsupported library config version {} in {}",
                config.version,
                path.display()
            )));
        }
        Ok(config)
    }

    /// Reads the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }
        let config = Self::default();
        config.write(path)?;
        Ok(config)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                IndexError::Config(format!(
                    "failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).map_err(|error| {
            IndexError::Config(format!(
                "failed to write library config {}: {error}",
                path.display()
            ))
        })
    }
}

/// Config path named by `ASSET_INDEX_CONFIG`, if set.
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_thumbnail_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("asset-index")
        .join("thumbnails")
}
