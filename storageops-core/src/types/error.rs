//! Storage operation error types.
//!
//! Two classes of failure exist: the [`OpsError::NotSupported`] capability
//! sentinel, which a driver returns for an operation it intentionally does not
//! implement, and every other error, which is an operational failure.
//! Callers tell them apart by variant, never by message text.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes a driver attaches to a [`StorageError`].
///
/// The `error_type()` strings are stable and appear in suite reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorCode {
    /// The volume is not attached to any instance.
    VolumeDetached,
    /// The volume is in a state that does not allow the operation.
    VolumeInvalid,
    /// The volume is attached to another instance.
    VolumeAttachedOnRemoteNode,
    /// No volume exists with the given identifier.
    VolumeNotFound,
    /// The driver could not resolve a local device path.
    InvalidDevicePath,
}

impl StorageErrorCode {
    /// Get the error code as a stable string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageErrorCode::VolumeDetached => "volume_detached",
            StorageErrorCode::VolumeInvalid => "volume_invalid",
            StorageErrorCode::VolumeAttachedOnRemoteNode => "volume_attached_on_remote_node",
            StorageErrorCode::VolumeNotFound => "volume_not_found",
            StorageErrorCode::InvalidDevicePath => "invalid_device_path",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coded error reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message} (instance: {instance})")]
pub struct StorageError {
    /// What went wrong.
    pub code: StorageErrorCode,
    /// Driver-provided details.
    pub message: String,
    /// Instance the error relates to, empty when unknown.
    pub instance: String,
}

impl StorageError {
    /// Create a new storage error.
    pub fn new(
        code: StorageErrorCode,
        message: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            instance: instance.into(),
        }
    }
}

/// Error returned by every [`StorageOps`](crate::StorageOps) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpsError {
    /// The capability sentinel: this driver intentionally does not implement
    /// the operation. No side effects were applied.
    #[error("operation not supported")]
    NotSupported,

    /// Coded driver error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Any other driver failure.
    #[error("driver error: {0}")]
    Driver(String),
}

impl OpsError {
    /// Create a generic driver error.
    pub fn driver(message: impl Into<String>) -> Self {
        OpsError::Driver(message.into())
    }

    /// Create a coded storage error.
    pub fn storage(
        code: StorageErrorCode,
        message: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        OpsError::Storage(StorageError::new(code, message, instance))
    }

    /// Whether this is the capability sentinel.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, OpsError::NotSupported)
    }

    /// The storage error code, if this is a coded error.
    pub fn code(&self) -> Option<StorageErrorCode> {
        match self {
            OpsError::Storage(e) => Some(e.code),
            _ => None,
        }
    }

    /// Get the error type as a stable string.
    pub fn error_type(&self) -> &'static str {
        match self {
            OpsError::NotSupported => "not_supported",
            OpsError::Storage(_) => "storage_error",
            OpsError::Driver(_) => "driver_error",
        }
    }
}

/// Result alias for storage operations.
pub type OpsResult<T> = Result<T, OpsError>;
