//! In-memory storage driver.
//!
//! A fully conforming [`StorageOps`] implementation that keeps volumes in a
//! map. Capabilities can be switched off, and [`Fault`]s can be injected to
//! reproduce common driver bugs so the suite's own detection can be tested.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use storageops_core::{
    matches_all, DeviceMappings, DeviceObject, Enumeration, OpsError, OpsResult, SetIdentifier,
    StorageErrorCode, StorageOps, TagSet,
};

/// Default instance identifier reported by [`MemoryDriver::instance_id`].
pub const DEFAULT_INSTANCE_ID: &str = "i-memory";

const DEVICE_PREFIX: &str = "/dev/xvd";

/// Template for creating a memory disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTemplate {
    /// Size in GiB. Must be non-zero.
    pub size: u64,
    /// Free-form volume type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
}

impl MemoryTemplate {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            volume_type: None,
        }
    }
}

/// Disk handle returned by the memory driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDisk {
    pub id: String,
    pub size: u64,
    pub volume_type: Option<String>,
    pub labels: TagSet,
}

/// Snapshot handle returned by the memory driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub id: String,
    pub source: String,
    pub readonly: bool,
}

/// Optional capabilities the driver exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub snapshots: bool,
    pub tags: bool,
    pub enumerate: bool,
    pub inspect: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl Capabilities {
    /// Every optional capability enabled.
    pub fn all() -> Self {
        Self {
            snapshots: true,
            tags: true,
            enumerate: true,
            inspect: true,
        }
    }

    /// Only the required lifecycle.
    pub fn none() -> Self {
        Self {
            snapshots: false,
            tags: false,
            enumerate: false,
            inspect: false,
        }
    }
}

/// Driver bugs the memory driver can reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fault {
    /// `device_id` returns an empty string for disks.
    EmptyDeviceId,
    /// `device_id` returns an empty string for snapshots.
    EmptySnapshotId,
    /// `snapshot_delete` always fails.
    SnapshotDeleteFails,
    /// `apply_tags` lowercases keys and values before storing them.
    LowercaseTags,
    /// `remove_tags` succeeds without removing anything.
    RemoveTagsNoop,
    /// `apply_tags` fails on a volume that was tagged before.
    ReapplyTagsFails,
    /// `device_mappings` is empty once any detach has happened.
    StaleMappingsAfterDetach,
    /// `detach_from` succeeds without detaching.
    DetachFromNoop,
    /// `enumerate` ignores the label filter.
    EnumerateIgnoresLabels,
    /// `enumerate` matches nothing when given a label filter.
    EnumerateMissesLabels,
    /// `inspect` returns no handles.
    InspectDropsResults,
    /// `attach` succeeds but reports an empty device path.
    EmptyAttachPath,
    /// `device_path` reports a path other than the attached one.
    DevicePathMismatch,
    /// `delete` always fails.
    DeleteFails,
    /// Disabled capabilities return a generic error instead of the sentinel.
    NotSupportedAsError,
}

#[derive(Debug, Clone)]
struct Volume {
    size: u64,
    volume_type: Option<String>,
    labels: TagSet,
    device_path: Option<String>,
    tagged: bool,
}

impl Volume {
    fn handle(&self, id: &str) -> MemoryDisk {
        MemoryDisk {
            id: id.to_string(),
            size: self.size,
            volume_type: self.volume_type.clone(),
            labels: self.labels.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_volume: u32,
    next_snapshot: u32,
    volumes: BTreeMap<String, Volume>,
    snapshots: BTreeMap<String, MemorySnapshot>,
    detached_once: bool,
    calls: Vec<String>,
}

impl State {
    fn volume(&self, id: &str) -> OpsResult<&Volume> {
        self.volumes.get(id).ok_or_else(|| not_found(id))
    }

    fn volume_mut(&mut self, id: &str) -> OpsResult<&mut Volume> {
        self.volumes.get_mut(id).ok_or_else(|| not_found(id))
    }

    /// Lowest `/dev/xvd?` letter not held by an attached volume, starting at `b`.
    fn free_device_path(&self) -> OpsResult<String> {
        let used: BTreeSet<&str> = self
            .volumes
            .values()
            .filter_map(|v| v.device_path.as_deref())
            .collect();
        ('b'..='z')
            .map(|c| format!("{}{}", DEVICE_PREFIX, c))
            .find(|p| !used.contains(p.as_str()))
            .ok_or_else(|| {
                OpsError::storage(StorageErrorCode::InvalidDevicePath, "no free device paths", "")
            })
    }
}

fn not_found(id: &str) -> OpsError {
    OpsError::storage(
        StorageErrorCode::VolumeNotFound,
        format!("volume {} not found", id),
        "",
    )
}

/// In-memory [`StorageOps`] implementation.
#[derive(Debug)]
pub struct MemoryDriver {
    name: String,
    instance_id: String,
    capabilities: Capabilities,
    faults: BTreeSet<Fault>,
    state: Mutex<State>,
}

impl MemoryDriver {
    /// Create a conforming driver with every capability enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            capabilities: Capabilities::all(),
            faults: BTreeSet::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.insert(fault);
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Number of volumes that exist (created and not deleted).
    pub fn volume_count(&self) -> usize {
        self.state().volumes.len()
    }

    /// Number of snapshots that exist.
    pub fn snapshot_count(&self) -> usize {
        self.state().snapshots.len()
    }

    /// Every operation invoked so far, as `op` or `op:<id>`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock state and record the call.
    fn enter(&self, op: &str, id: Option<&str>) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(match id {
            Some(id) => format!("{}:{}", op, id),
            None => op.to_string(),
        });
        state
    }

    fn release(&self, op: &str, volume_id: &str, instance_id: &str) -> OpsResult<()> {
        let noop = self.has(Fault::DetachFromNoop) && op == "detach_from";
        let mut state = self.enter(op, Some(volume_id));
        if instance_id != self.instance_id {
            return Err(OpsError::storage(
                StorageErrorCode::VolumeAttachedOnRemoteNode,
                format!("unknown instance {}", instance_id),
                instance_id,
            ));
        }
        let volume = state.volume_mut(volume_id)?;
        if volume.device_path.is_none() {
            return Err(OpsError::storage(
                StorageErrorCode::VolumeDetached,
                format!("volume {} is not attached", volume_id),
                instance_id,
            ));
        }
        if !noop {
            volume.device_path = None;
        }
        state.detached_once = true;
        Ok(())
    }

    fn require(&self, enabled: bool, op: &str) -> OpsResult<()> {
        if enabled {
            Ok(())
        } else if self.has(Fault::NotSupportedAsError) {
            Err(OpsError::driver(format!("{} is not available", op)))
        } else {
            Err(OpsError::NotSupported)
        }
    }
}

impl StorageOps for MemoryDriver {
    type Template = MemoryTemplate;
    type Disk = MemoryDisk;
    type Snapshot = MemorySnapshot;

    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, template: &MemoryTemplate, labels: Option<&TagSet>) -> OpsResult<MemoryDisk> {
        let mut state = self.enter("create", None);
        if template.size == 0 {
            return Err(OpsError::storage(
                StorageErrorCode::VolumeInvalid,
                "size must be greater than zero",
                &self.instance_id,
            ));
        }

        state.next_volume += 1;
        let id = format!("vol-{:04}", state.next_volume);
        let volume = Volume {
            size: template.size,
            volume_type: template.volume_type.clone(),
            labels: labels.cloned().unwrap_or_default(),
            device_path: None,
            tagged: false,
        };
        let handle = volume.handle(&id);
        state.volumes.insert(id, volume);
        Ok(handle)
    }

    fn device_id(&self, object: DeviceObject<'_, Self>) -> OpsResult<String> {
        match object {
            DeviceObject::Disk(_) if self.has(Fault::EmptyDeviceId) => Ok(String::new()),
            DeviceObject::Disk(disk) => Ok(disk.id.clone()),
            DeviceObject::Snapshot(_) if self.has(Fault::EmptySnapshotId) => Ok(String::new()),
            DeviceObject::Snapshot(snap) => Ok(snap.id.clone()),
        }
    }

    fn snapshot(&self, volume_id: &str, readonly: bool) -> OpsResult<MemorySnapshot> {
        self.require(self.capabilities.snapshots, "snapshot")?;
        let mut state = self.enter("snapshot", Some(volume_id));
        state.volume(volume_id)?;

        state.next_snapshot += 1;
        let snap = MemorySnapshot {
            id: format!("snap-{:04}", state.next_snapshot),
            source: volume_id.to_string(),
            readonly,
        };
        state.snapshots.insert(snap.id.clone(), snap.clone());
        Ok(snap)
    }

    fn snapshot_delete(&self, snapshot_id: &str) -> OpsResult<()> {
        self.require(self.capabilities.snapshots, "snapshot_delete")?;
        let mut state = self.enter("snapshot_delete", Some(snapshot_id));
        if self.has(Fault::SnapshotDeleteFails) {
            return Err(OpsError::driver(format!("delete of {} rejected", snapshot_id)));
        }
        state
            .snapshots
            .remove(snapshot_id)
            .map(|_| ())
            .ok_or_else(|| not_found(snapshot_id))
    }

    fn apply_tags(&self, volume_id: &str, labels: &TagSet) -> OpsResult<()> {
        self.require(self.capabilities.tags, "apply_tags")?;
        let lowercase = self.has(Fault::LowercaseTags);
        let mut state = self.enter("apply_tags", Some(volume_id));
        let volume = state.volume_mut(volume_id)?;
        if volume.tagged && self.has(Fault::ReapplyTagsFails) {
            return Err(OpsError::driver(format!("tags already applied to {}", volume_id)));
        }
        volume.tagged = true;
        for (key, value) in labels {
            if lowercase {
                volume.labels.insert(key.to_lowercase(), value.to_lowercase());
            } else {
                volume.labels.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn tags(&self, volume_id: &str) -> OpsResult<TagSet> {
        self.require(self.capabilities.tags, "tags")?;
        let state = self.enter("tags", Some(volume_id));
        Ok(state.volume(volume_id)?.labels.clone())
    }

    fn remove_tags(&self, volume_id: &str, labels: &TagSet) -> OpsResult<()> {
        self.require(self.capabilities.tags, "remove_tags")?;
        let noop = self.has(Fault::RemoveTagsNoop);
        let mut state = self.enter("remove_tags", Some(volume_id));
        let volume = state.volume_mut(volume_id)?;
        if !noop {
            for key in labels.keys() {
                volume.labels.remove(key);
            }
        }
        Ok(())
    }

    fn enumerate(
        &self,
        volume_ids: &[String],
        labels: &TagSet,
        set_identifier: &SetIdentifier,
    ) -> OpsResult<Enumeration<MemoryDisk>> {
        self.require(self.capabilities.enumerate, "enumerate")?;
        let ignore_labels = self.has(Fault::EnumerateIgnoresLabels);
        let state = self.enter("enumerate", None);

        let mut result = Enumeration::new();
        if self.has(Fault::EnumerateMissesLabels) && !labels.is_empty() {
            return Ok(result);
        }
        for (id, volume) in &state.volumes {
            if !volume_ids.is_empty() && !volume_ids.contains(id) {
                continue;
            }
            if !ignore_labels && !matches_all(&volume.labels, labels) {
                continue;
            }
            result.push(set_identifier.group_key(&volume.labels), volume.handle(id));
        }
        Ok(result)
    }

    fn inspect(&self, volume_ids: &[String]) -> OpsResult<Vec<MemoryDisk>> {
        self.require(self.capabilities.inspect, "inspect")?;
        let state = self.enter("inspect", None);
        if self.has(Fault::InspectDropsResults) {
            return Ok(Vec::new());
        }
        Ok(volume_ids
            .iter()
            .filter_map(|id| state.volumes.get(id).map(|v| v.handle(id)))
            .collect())
    }

    fn attach(&self, volume_id: &str) -> OpsResult<String> {
        let mut state = self.enter("attach", Some(volume_id));
        if let Some(path) = &state.volume(volume_id)?.device_path {
            return Err(OpsError::storage(
                StorageErrorCode::VolumeInvalid,
                format!("volume {} is already attached at {}", volume_id, path),
                &self.instance_id,
            ));
        }
        let path = state.free_device_path()?;
        state.volume_mut(volume_id)?.device_path = Some(path.clone());
        if self.has(Fault::EmptyAttachPath) {
            return Ok(String::new());
        }
        Ok(path)
    }

    fn device_mappings(&self) -> OpsResult<DeviceMappings> {
        let state = self.enter("device_mappings", None);
        if self.has(Fault::StaleMappingsAfterDetach) && state.detached_once {
            return Ok(DeviceMappings::new());
        }
        Ok(state
            .volumes
            .iter()
            .filter_map(|(id, v)| v.device_path.clone().map(|p| (p, id.clone())))
            .collect())
    }

    fn detach_from(&self, volume_id: &str, instance_id: &str) -> OpsResult<()> {
        self.release("detach_from", volume_id, instance_id)
    }

    fn detach(&self, volume_id: &str) -> OpsResult<()> {
        self.release("detach", volume_id, &self.instance_id)
    }

    fn device_path(&self, volume_id: &str) -> OpsResult<String> {
        let state = self.enter("device_path", Some(volume_id));
        let path = state.volume(volume_id)?.device_path.clone().ok_or_else(|| {
            OpsError::storage(
                StorageErrorCode::VolumeDetached,
                format!("volume {} is not attached", volume_id),
                &self.instance_id,
            )
        })?;
        if self.has(Fault::DevicePathMismatch) {
            return Ok(format!("{}z", DEVICE_PREFIX));
        }
        Ok(path)
    }

    fn instance_id(&self) -> String {
        self.instance_id.clone()
    }

    fn delete(&self, volume_id: &str) -> OpsResult<()> {
        let mut state = self.enter("delete", Some(volume_id));
        if self.has(Fault::DeleteFails) {
            return Err(OpsError::driver(format!("delete of {} rejected", volume_id)));
        }
        if state.volume(volume_id)?.device_path.is_some() {
            return Err(OpsError::storage(
                StorageErrorCode::VolumeInvalid,
                format!("volume {} is still attached", volume_id),
                &self.instance_id,
            ));
        }
        state.volumes.remove(volume_id);
        Ok(())
    }
}
