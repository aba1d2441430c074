//! User settings: TOML file plus environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use filecatalog_analyze::DEFAULT_ARTIFACT;
use filecatalog_scan::ScanConfig;

/// Environment variable overriding the scan root.
pub const ROOT_ENV: &str = "FILECATALOG_ROOT";
/// Environment variable overriding the catalog database path.
pub const DB_ENV: &str = "FILECATALOG_DB";

/// Settings for the `fcat` binary.
///
/// ```toml
/// catalog_path = "/var/lib/filecatalog/catalog.db"
/// artifact_path = "file-hashes.json"
///
/// [scan]
/// root = "/srv/data"
/// max_hash_size = 1073741824
/// ignore_patterns = [".git", "*.tmp"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite catalog location.
    pub catalog_path: PathBuf,
    /// Where folder verification writes its JSON file.
    pub artifact_path: PathBuf,
    /// Scan root and tuning.
    pub scan: ScanConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT),
            scan: ScanConfig::default(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filecatalog")
        .join("catalog.db")
}

impl Settings {
    /// `<config dir>/filecatalog/config.toml`, where the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("filecatalog").join("config.toml"))
    }

    /// Load settings and apply environment overrides.
    ///
    /// An explicit path must exist. The default path is optional; when it
    /// is absent the built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_toml(&text)
            .wrap_err_with(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.scan.validate()?;
        Ok(settings)
    }

    /// Apply `FILECATALOG_ROOT` and `FILECATALOG_DB`, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ROOT_ENV).filter(|v| !v.is_empty()) {
            self.scan.root = PathBuf::from(root);
        }
        if let Some(db) = lookup(DB_ENV).filter(|v| !v.is_empty()) {
            self.catalog_path = PathBuf::from(db);
        }
    }
}
