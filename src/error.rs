//! Error taxonomy for the settings engine
//!
//! Every error is recoverable: the caller picks a different input or
//! retries. No operation partially mutates state before failing.

use settings_path::{PathAddress, PathError};

use crate::schema::LeafKind;

/// Errors returned by the settings engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("malformed path: {0}")]
    MalformedPath(#[from] PathError),

    #[error("unknown path: {0}")]
    UnknownPath(String),

    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: LeafKind,
        actual: String,
    },

    #[error("index {index} out of range at {path} (length {len})")]
    Range {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("profile '{0}' is protected and cannot be deleted")]
    ProtectedProfile(String),

    #[error("profile '{0}' is active; switch to another profile first")]
    ActiveProfile(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("validation failed at {path}: {reason}")]
    Validation { path: String, reason: String },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("an apply is already in progress")]
    OperationInProgress,

    #[error("apply cancelled before persistence")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl SettingsError {
    pub(crate) fn unknown(path: &PathAddress) -> Self {
        SettingsError::UnknownPath(path.to_string())
    }

    pub(crate) fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SettingsError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;
