//! TOML-based application configuration.
//!
//! Stores the defaults the `flowmodal` binary uses when a markup file does
//! not say otherwise:
//! - Storage tiers and database file name
//! - Watch loop tick interval
//!
//! Configuration is stored at `~/.config/flowmodal/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{data_dir, parse_tiers, StorageTier};
use crate::error::FlowError;
use crate::timer::TIMER_INTERVAL_MS;

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Tier tokens used when the coordinator has no `storages` attribute.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<String>,
    /// File name of the SQLite database inside the data directory.
    #[serde(default = "default_database")]
    pub database: String,
}

/// Watch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/flowmodal/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub run: RunConfig,
}

fn default_tiers() -> Vec<String> {
    vec!["local".into(), "memory".into()]
}
fn default_database() -> String {
    super::database::DATABASE_FILE.into()
}
fn default_tick_interval_ms() -> u64 {
    TIMER_INTERVAL_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            database: default_database(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err("config key is empty".into());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| format!("unknown config key: {key}"))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| format!("unknown config key: {key}"))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(value.parse::<bool>()?),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| format!("cannot parse '{value}' as number"))?;
                        serde_json::Value::Number(n.into())
                    }
                    // Lists are written the way the `storages` attribute is.
                    serde_json::Value::Array(_) if !value.trim_start().starts_with('[') => {
                        serde_json::Value::Array(
                            crate::convert::parse_list(value, ",")
                                .into_iter()
                                .map(serde_json::Value::String)
                                .collect(),
                        )
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value)?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| format!("unknown config key: {key}"))?;
        }

        Err(format!("unknown config key: {key}").into())
    }

    fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// the result is not a valid configuration, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.apply(key, value)?;
        self.save()?;
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.storage_tiers()?;
        *self = updated;
        Ok(())
    }

    /// Parsed default tiers.
    ///
    /// # Errors
    ///
    /// Returns an error when a token does not name a storage tier.
    pub fn storage_tiers(&self) -> Result<Vec<StorageTier>, FlowError> {
        parse_tiers(&self.storage.tiers)
    }

    /// Absolute path of the configured database file.
    pub fn database_path(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join(&self.storage.database))
    }
}
