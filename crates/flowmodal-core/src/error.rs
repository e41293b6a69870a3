//! Core error types for flowmodal-core.
//!
//! Every violated invariant surfaces as a [`FlowError`]. Variants group the
//! failure by cause; the message carries the detail the embedder needs to fix
//! its configuration or its call sequence.

use std::path::PathBuf;
use thiserror::Error;

use crate::events::SignalKind;

/// Core error type for flowmodal-core.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A flow element is placed where it cannot work (e.g. a step outside a
    /// coordinator, or two badges in one step).
    #[error("FlowModalError: {0}")]
    Structure(String),

    /// An attribute or configuration value could not be parsed or validated.
    #[error("FlowModalError: {0}")]
    InvalidValue(String),

    /// An operation was called while the target is in the wrong state.
    #[error("FlowModalError: {0}")]
    IllegalState(String),

    /// A handler received a signal it is not registered for.
    #[error("FlowModalError: Expected signal to be {expected}, got {actual}")]
    SignalMismatch {
        expected: &'static str,
        actual: SignalKind,
    },

    /// A step index that does not exist in the coordinator's child list.
    #[error("FlowModalError: Index {index} out of bounds for steps (length: {len})")]
    OutOfBounds { index: usize, len: usize },

    /// A markup document could not be read or parsed.
    #[error("FlowModalError: invalid markup: {0}")]
    Markup(String),

    /// The persistence backend failed.
    #[error("FlowModalError: storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl FlowError {
    /// Invalid duration attribute, worded after the attribute name.
    pub fn invalid_duration(attribute: &str) -> Self {
        FlowError::InvalidValue(format!(
            "\"{attribute}\" is invalid. Expected a valid duration string (e.g., \"30m\", \"1h\")."
        ))
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the SQLite database file.
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// No storage tier accepted the write.
    #[error("No storage tier available for namespace '{namespace}'")]
    NoTierAvailable { namespace: String },

    /// Stored value could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The data directory could not be prepared.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for FlowError
pub type Result<T, E = FlowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_error_prefix() {
        let err = FlowError::Structure("<flow-step> must be a child of <flow-modal>.".into());
        assert_eq!(
            err.to_string(),
            "FlowModalError: <flow-step> must be a child of <flow-modal>."
        );
    }

    #[test]
    fn invalid_duration_names_the_attribute() {
        let msg = FlowError::invalid_duration("hint-duration").to_string();
        assert!(msg.contains("\"hint-duration\" is invalid"));
    }

    #[test]
    fn storage_errors_convert() {
        let err: FlowError = StorageError::Locked.into();
        assert!(matches!(err, FlowError::Storage(StorageError::Locked)));
    }
}
