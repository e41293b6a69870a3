//! Namespaced, expiring store over ordered storage tiers.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::database::DATABASE_FILE;
use super::{data_dir, Database, FlowStorage, MemoryBackend, StorageBackend, StorageTier, StoredEntry};
use crate::clock::SharedClock;
use crate::error::StorageError;

/// Reads from the first tier holding a live entry; writes to the first tier
/// that accepts the write. Entries expire `retention_ms` after they were
/// written.
pub struct CascadeStorage {
    namespace: String,
    retention_ms: u64,
    clock: SharedClock,
    tiers: Vec<Box<dyn StorageBackend>>,
}

impl CascadeStorage {
    pub fn new(
        namespace: impl Into<String>,
        retention_ms: u64,
        clock: SharedClock,
        tiers: Vec<Box<dyn StorageBackend>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            retention_ms,
            clock,
            tiers,
        }
    }

    /// Open the backends named by `tiers` with the `local` tier at its
    /// default location in the data directory.
    ///
    /// # Errors
    /// Returns [`StorageError::NoTierAvailable`] when no tier could be opened.
    pub fn open(
        tiers: &[StorageTier],
        namespace: impl Into<String>,
        retention_ms: u64,
        clock: SharedClock,
    ) -> Result<Self, StorageError> {
        let database = data_dir().map(|dir| dir.join(DATABASE_FILE));
        match database {
            Ok(path) => Self::open_at(&path, tiers, namespace, retention_ms, clock),
            Err(e) => {
                warn!(error = %e, "data directory unavailable");
                let remaining: Vec<StorageTier> = tiers
                    .iter()
                    .copied()
                    .filter(|t| *t != StorageTier::Local)
                    .collect();
                Self::open_at(Path::new(""), &remaining, namespace, retention_ms, clock)
            }
        }
    }

    /// Open the backends named by `tiers`, skipping any that fail to open.
    /// The `local` tier uses the SQLite file at `database`.
    ///
    /// # Errors
    /// Returns [`StorageError::NoTierAvailable`] when no tier could be opened.
    pub fn open_at(
        database: &Path,
        tiers: &[StorageTier],
        namespace: impl Into<String>,
        retention_ms: u64,
        clock: SharedClock,
    ) -> Result<Self, StorageError> {
        let namespace = namespace.into();
        let mut backends: Vec<Box<dyn StorageBackend>> = Vec::new();
        for tier in tiers {
            let opened = match tier {
                StorageTier::Local => Database::open_path(database).inspect(|db| {
                    // Abandoned namespaces are never read again.
                    match db.purge_expired(clock.now_ms()) {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "purged expired rows"),
                        Err(e) => warn!(error = %e, "failed to purge expired rows"),
                    }
                }),
                StorageTier::Session => Database::open_memory(),
                StorageTier::Memory => {
                    backends.push(Box::new(MemoryBackend::thread_shared()));
                    continue;
                }
            };
            match opened {
                Ok(db) => backends.push(Box::new(db)),
                Err(e) => warn!(tier = %tier, error = %e, "storage tier unavailable"),
            }
        }
        if backends.is_empty() {
            return Err(StorageError::NoTierAvailable { namespace });
        }
        debug!(namespace = %namespace, tiers = backends.len(), "storage opened");
        Ok(Self::new(namespace, retention_ms, clock, backends))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_ms
    }

    pub fn tiers(&self) -> Vec<StorageTier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }
}

impl FlowStorage for CascadeStorage {
    fn get(&mut self, key: &str) -> Result<Option<Value>, StorageError> {
        let now = self.clock.now_ms();
        let mut last_error = None;
        let mut any_ok = false;

        for backend in self.tiers.iter_mut() {
            match backend.read(&self.namespace, key) {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    any_ok = true;
                    debug!(namespace = %self.namespace, key, tier = %backend.tier(), "dropping expired entry");
                    if let Err(e) = backend.delete(&self.namespace, key) {
                        warn!(
                            namespace = %self.namespace,
                            key,
                            tier = %backend.tier(),
                            error = %e,
                            "failed to drop expired entry"
                        );
                    }
                }
                Ok(Some(entry)) => return Ok(Some(entry.value)),
                Ok(None) => any_ok = true,
                Err(e) => {
                    warn!(namespace = %self.namespace, key, tier = %backend.tier(), error = %e, "storage read failed, trying next tier");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_ok => Err(e),
            _ => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        let entry = StoredEntry {
            value,
            expires_at: Some(self.clock.now_ms().saturating_add(self.retention_ms)),
        };
        let mut last_error = None;

        for backend in self.tiers.iter_mut() {
            match backend.write(&self.namespace, key, &entry) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(namespace = %self.namespace, key, tier = %backend.tier(), error = %e, "storage write failed, trying next tier");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| StorageError::NoTierAvailable {
            namespace: self.namespace.clone(),
        }))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut first_error = None;
        for backend in self.tiers.iter_mut() {
            if let Err(e) = backend.delete(&self.namespace, key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        let mut first_error = None;
        for backend in self.tiers.iter_mut() {
            if let Err(e) = backend.clear(&self.namespace) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
