//! `qmlcatalog.toml` - where the catalog lives and how loudly to log

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Catalog database path, relative to the working directory
    pub database: Option<String>,
    /// `tracing` filter directive, e.g. `qmlcatalog=debug`
    pub log: Option<String>,
}

impl CatalogConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_database_path_in(Path::new(".")))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("qmlcatalog.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".qmlcatalog").join("catalog.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<CatalogConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CatalogConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &CatalogConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
