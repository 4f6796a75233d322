//! Fixa Settings
//!
//! Configuration consumed by the fixture loader:
//! - The schema whose foreign keys drive table ordering
//! - The switch that turns dependency sorting off
//! - Insert batch size and backup schema for master data
//! - Overrides for generated default values
//!
//! Settings live in a TOML file and are read by well-known keys through
//! [`SettingsSource`] at the moment a component needs them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Schema whose foreign keys are introspected for sorting
pub const SCHEMA_KEY: &str = "fixa.db.schema";
/// When true, tables are processed in the order given
pub const SUPPRESS_TABLE_SORT_KEY: &str = "fixa.suppress-table-sort";
/// Rows per flushed INSERT batch
pub const BATCH_SIZE_KEY: &str = "fixa.insert.batch-size";
/// Schema holding the pristine copy of master data
pub const BACKUP_SCHEMA_KEY: &str = "fixa.backup-schema";

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Key/value lookup of configuration values
pub trait SettingsSource: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str) -> bool {
        self.get_string(key).is_some_and(|v| parse_flag(&v))
    }

    fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_string(key).and_then(|v| v.trim().parse().ok())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

impl SettingsSource for HashMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FixtureSettings {
    pub db: DbSettings,
    pub sort: SortSettings,
    pub insert: InsertSettings,
    pub defaults: DefaultValueSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DbSettings {
    pub schema: Option<String>,
    pub backup_schema: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SortSettings {
    pub suppress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsertSettings {
    pub batch_size: usize,
}

impl Default for InsertSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Overrides for generated default values. Unset fields keep the built-in
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DefaultValueSettings {
    pub number: Option<String>,
    /// Timestamp literal, `yyyy-MM-dd HH:mm:ss[.f...]`
    pub date: Option<String>,
    pub char: Option<String>,
}

impl FixtureSettings {
    /// Load from the per-user settings file, or defaults if there is none
    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let settings = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse settings in {:?}", path))?;
        tracing::info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings TOML")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("fixa").join("settings.toml"))
    }
}

impl SettingsSource for FixtureSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        match key {
            SCHEMA_KEY => self.db.schema.clone(),
            SUPPRESS_TABLE_SORT_KEY => Some(self.sort.suppress.to_string()),
            BATCH_SIZE_KEY => Some(self.insert.batch_size.to_string()),
            BACKUP_SCHEMA_KEY => self.db.backup_schema.clone(),
            _ => None,
        }
    }
}
