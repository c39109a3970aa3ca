//! Storage Ops Core Library
//!
//! The contract every block-storage driver implements, independent of the
//! backend it talks to.
//!
//! # Architecture
//!
//! - `driver`: the [`StorageOps`] trait and [`DeviceObject`] handle wrapper
//! - `types`: error taxonomy, tag sets, device mappings, enumeration results
//!
//! Operations a driver does not implement return [`OpsError::NotSupported`],
//! the capability sentinel. Callers must match on the variant; the message
//! text is not part of the contract.

pub mod driver;
pub mod types;

pub use driver::{DeviceObject, StorageOps};
pub use types::{
    matches_all,
    tag_set,
    DeviceMappings,
    Enumeration,
    OpsError,
    OpsResult,
    SetIdentifier,
    StorageError,
    StorageErrorCode,
    TagSet,
};
