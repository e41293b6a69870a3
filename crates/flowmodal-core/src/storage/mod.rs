mod cascade;
pub mod config;
pub mod database;
mod memory;

pub use cascade::CascadeStorage;
pub use config::Config;
pub use database::Database;
pub use memory::MemoryBackend;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowError, StorageError};

/// Returns `~/.config/flowmodal[-dev]/` based on FLOWMODAL_ENV.
///
/// Set FLOWMODAL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FLOWMODAL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("flowmodal-dev")
    } else {
        base_dir.join("flowmodal")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// A value as kept by a storage tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: Value,
    /// Epoch milliseconds after which the entry is gone. `None` never expires.
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Identifier of a storage tier, as written in the `storages` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Durable SQLite file in the data directory.
    Local,
    /// In-memory SQLite living as long as the flow that opened it.
    Session,
    /// Process memory, shared by every flow on the thread.
    Memory,
}

impl StorageTier {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageTier::Local => "local",
            StorageTier::Session => "session",
            StorageTier::Memory => "memory",
        }
    }

    /// Parse a single tier token.
    pub fn parse(token: &str) -> Result<Self, FlowError> {
        match token {
            "local" => Ok(StorageTier::Local),
            "session" => Ok(StorageTier::Session),
            "memory" => Ok(StorageTier::Memory),
            other => Err(FlowError::InvalidValue(format!(
                "Invalid storage identifier: {other}"
            ))),
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StorageTier {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageTier::parse(s)
    }
}

/// Parse an ordered list of tier tokens. Duplicates keep their first position.
pub fn parse_tiers<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<StorageTier>, FlowError> {
    let mut tiers = Vec::with_capacity(tokens.len());
    for token in tokens {
        let tier = StorageTier::parse(token.as_ref())?;
        if !tiers.contains(&tier) {
            tiers.push(tier);
        }
    }
    Ok(tiers)
}

/// One physical storage tier.
pub trait StorageBackend {
    fn tier(&self) -> StorageTier;
    fn read(&self, namespace: &str, key: &str) -> Result<Option<StoredEntry>, StorageError>;
    fn write(&mut self, namespace: &str, key: &str, entry: &StoredEntry) -> Result<(), StorageError>;
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
    fn clear(&mut self, namespace: &str) -> Result<(), StorageError>;
}

/// Key/value persistence used by a flow for `started-at`, `activated-step`
/// and `timed-out`.
pub trait FlowStorage {
    /// Live value under `key`. Expired entries read as absent.
    fn get(&mut self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    /// Drop every key of this flow's namespace.
    fn reset(&mut self) -> Result<(), StorageError>;
}
