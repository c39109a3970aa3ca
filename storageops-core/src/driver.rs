//! The storage driver contract.

use crate::types::{DeviceMappings, Enumeration, OpsError, OpsResult, SetIdentifier, TagSet};

/// A disk or snapshot handle passed to [`StorageOps::device_id`].
pub enum DeviceObject<'a, O: StorageOps + ?Sized> {
    /// A handle returned by [`StorageOps::create`].
    Disk(&'a O::Disk),
    /// A handle returned by [`StorageOps::snapshot`].
    Snapshot(&'a O::Snapshot),
}

impl<O: StorageOps + ?Sized> Clone for DeviceObject<'_, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O: StorageOps + ?Sized> Copy for DeviceObject<'_, O> {}

impl<O: StorageOps + ?Sized> DeviceObject<'_, O> {
    /// Short name of the handle kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceObject::Disk(_) => "disk",
            DeviceObject::Snapshot(_) => "snapshot",
        }
    }
}

/// Block-storage operations implemented once per backend.
///
/// Handles (`Disk`, `Snapshot`) and creation templates are opaque to callers;
/// every other exchange goes through device identifier strings.
///
/// Optional capabilities (snapshots, tags, enumeration, inspection) default to
/// [`OpsError::NotSupported`]. A driver that overrides one of them must never
/// return the sentinel after mutating state.
pub trait StorageOps {
    /// Driver-specific disk creation template.
    type Template;
    /// Driver-specific disk handle.
    type Disk;
    /// Driver-specific snapshot handle.
    type Snapshot;

    /// Stable, non-empty driver name.
    fn name(&self) -> &str;

    /// Create a disk from a template, optionally labelled.
    fn create(&self, template: &Self::Template, labels: Option<&TagSet>) -> OpsResult<Self::Disk>;

    /// Resolve a disk or snapshot handle to its device identifier.
    fn device_id(&self, object: DeviceObject<'_, Self>) -> OpsResult<String>;

    /// Snapshot the disk with the given identifier.
    fn snapshot(&self, _volume_id: &str, _readonly: bool) -> OpsResult<Self::Snapshot> {
        Err(OpsError::NotSupported)
    }

    /// Delete a snapshot by identifier.
    fn snapshot_delete(&self, _snapshot_id: &str) -> OpsResult<()> {
        Err(OpsError::NotSupported)
    }

    /// Apply labels to a disk. Reapplying the same labels is not an error.
    fn apply_tags(&self, _volume_id: &str, _labels: &TagSet) -> OpsResult<()> {
        Err(OpsError::NotSupported)
    }

    /// Labels currently on a disk.
    fn tags(&self, _volume_id: &str) -> OpsResult<TagSet> {
        Err(OpsError::NotSupported)
    }

    /// Remove the keys of `labels` from a disk.
    fn remove_tags(&self, _volume_id: &str, _labels: &TagSet) -> OpsResult<()> {
        Err(OpsError::NotSupported)
    }

    /// Disks among `volume_ids` that carry every label in `labels`.
    ///
    /// No match yields an empty enumeration, not an error.
    fn enumerate(
        &self,
        _volume_ids: &[String],
        _labels: &TagSet,
        _set_identifier: &SetIdentifier,
    ) -> OpsResult<Enumeration<Self::Disk>> {
        Err(OpsError::NotSupported)
    }

    /// One disk handle per valid identifier.
    fn inspect(&self, _volume_ids: &[String]) -> OpsResult<Vec<Self::Disk>> {
        Err(OpsError::NotSupported)
    }

    /// Attach a disk to the current instance, returning its local device path.
    fn attach(&self, volume_id: &str) -> OpsResult<String>;

    /// Locally attached devices and the disks backing them.
    fn device_mappings(&self) -> OpsResult<DeviceMappings>;

    /// Detach a disk from a specific instance.
    fn detach_from(&self, volume_id: &str, instance_id: &str) -> OpsResult<()>;

    /// Detach a disk from the current instance.
    fn detach(&self, volume_id: &str) -> OpsResult<()>;

    /// Local device path of an attached disk.
    fn device_path(&self, volume_id: &str) -> OpsResult<String>;

    /// Identifier of the current compute instance.
    fn instance_id(&self) -> String;

    /// Delete a disk. The identifier is unusable afterwards.
    fn delete(&self, volume_id: &str) -> OpsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Driver implementing only the required lifecycle.
    struct Minimal {
        attached: RefCell<Option<String>>,
    }

    impl StorageOps for Minimal {
        type Template = ();
        type Disk = String;
        type Snapshot = String;

        fn name(&self) -> &str {
            "minimal"
        }

        fn create(&self, _: &(), _: Option<&TagSet>) -> OpsResult<String> {
            Ok("disk-1".to_string())
        }

        fn device_id(&self, object: DeviceObject<'_, Self>) -> OpsResult<String> {
            match object {
                DeviceObject::Disk(d) | DeviceObject::Snapshot(d) => Ok(d.clone()),
            }
        }

        fn attach(&self, volume_id: &str) -> OpsResult<String> {
            *self.attached.borrow_mut() = Some(volume_id.to_string());
            Ok("/dev/vdb".to_string())
        }

        fn device_mappings(&self) -> OpsResult<DeviceMappings> {
            Ok(self
                .attached
                .borrow()
                .iter()
                .map(|id| ("/dev/vdb".to_string(), id.clone()))
                .collect())
        }

        fn detach_from(&self, _: &str, _: &str) -> OpsResult<()> {
            self.attached.borrow_mut().take();
            Ok(())
        }

        fn detach(&self, volume_id: &str) -> OpsResult<()> {
            self.detach_from(volume_id, &self.instance_id())
        }

        fn device_path(&self, _: &str) -> OpsResult<String> {
            Ok("/dev/vdb".to_string())
        }

        fn instance_id(&self) -> String {
            "local".to_string()
        }

        fn delete(&self, _: &str) -> OpsResult<()> {
            Ok(())
        }
    }

    #[test]
    fn optional_operations_default_to_sentinel() {
        let d = Minimal {
            attached: RefCell::new(None),
        };

        assert!(d.snapshot("disk-1", true).unwrap_err().is_not_supported());
        assert!(d.snapshot_delete("snap-1").unwrap_err().is_not_supported());
        assert!(d.apply_tags("disk-1", &TagSet::new()).unwrap_err().is_not_supported());
        assert!(d.tags("disk-1").unwrap_err().is_not_supported());
        assert!(d.remove_tags("disk-1", &TagSet::new()).unwrap_err().is_not_supported());
        assert!(d
            .enumerate(&["disk-1".to_string()], &TagSet::new(), &SetIdentifier::None)
            .unwrap_err()
            .is_not_supported());
        assert!(d.inspect(&["disk-1".to_string()]).unwrap_err().is_not_supported());
    }

    #[test]
    fn device_object_resolves_both_handle_kinds() {
        let d = Minimal {
            attached: RefCell::new(None),
        };
        let disk = d.create(&(), None).unwrap();
        let snap = "snap-1".to_string();

        let object = DeviceObject::<Minimal>::Disk(&disk);
        assert_eq!(object.kind(), "disk");
        assert_eq!(d.device_id(object).unwrap(), "disk-1");
        assert_eq!(d.device_id(DeviceObject::Snapshot(&snap)).unwrap(), "snap-1");
    }
}
