//! Value types exchanged with storage drivers.

mod device;
mod error;
mod labels;

pub use device::{DeviceMappings, Enumeration, SetIdentifier};
pub use error::{OpsError, OpsResult, StorageError, StorageErrorCode};
pub use labels::{matches_all, tag_set, TagSet};
