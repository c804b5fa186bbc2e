use crate::backend::{DeviceHandle, StorageBackend};
use crate::config::ResolverOptions;
use crate::device::{
    DeviceClass, DeviceInfo, DeviceTarget, Privilege, StorageAdapterInfo, StorageDeviceInfo, StoragePartitionInfo,
};
use crate::enumerator::find_device_info;
use crate::path::{classify, physical_drive_path, regular_path};
use crate::query::get_storage_device_info;
use crate::topology::populate_topology;
use crate::TopologyError;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A physical disk together with the partitions, volumes and logical drives
/// that live on it.
///
/// Records are built once by [`DiskResolver`] and never change afterwards.
/// Equality compares every field, the three collections element by element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhysicalDiskInfo {
    name: Option<String>,
    device_path: String,
    dos_device_name: Option<String>,
    physical_device_object_name: Option<String>,
    partition_indexes: Vec<i32>,
    volume_guids: Vec<String>,
    logical_drives: Vec<String>,
    storage_adapter_info: Option<StorageAdapterInfo>,
    storage_device_info: StorageDeviceInfo,
    storage_partition_info: Option<StoragePartitionInfo>,
}

impl PhysicalDiskInfo {
    /// Friendly name of the disk as reported by the bus.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// NT object name, e.g. `\Device\Harddisk0\DR0`.
    pub fn dos_device_name(&self) -> Option<&str> {
        self.dos_device_name.as_deref()
    }

    pub fn physical_device_object_name(&self) -> Option<&str> {
        self.physical_device_object_name.as_deref()
    }

    pub fn partition_indexes(&self) -> &[i32] {
        &self.partition_indexes
    }

    pub fn volume_guids(&self) -> &[String] {
        &self.volume_guids
    }

    pub fn logical_drives(&self) -> &[String] {
        &self.logical_drives
    }

    pub fn storage_adapter_info(&self) -> Option<&StorageAdapterInfo> {
        self.storage_adapter_info.as_ref()
    }

    pub fn storage_device_info(&self) -> &StorageDeviceInfo {
        &self.storage_device_info
    }

    pub fn storage_partition_info(&self) -> Option<&StoragePartitionInfo> {
        self.storage_partition_info.as_ref()
    }

    pub fn device_number(&self) -> u32 {
        self.storage_device_info.device_number
    }

    pub fn total_size(&self) -> u64 {
        self.storage_device_info.total_size
    }
}

impl Hash for PhysicalDiskInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device_path.hash(state);
    }
}

impl fmt::Display for PhysicalDiskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or(&self.device_path))
    }
}

/// What is already known about the disk to resolve. Anything left `None` is
/// looked up.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub device_number: Option<u32>,
    pub device_path: Option<String>,
    pub storage_device_info: Option<StorageDeviceInfo>,
    pub device_info: Option<DeviceInfo>,
}

impl ResolveRequest {
    pub fn by_number(device_number: u32) -> Self {
        Self {
            device_number: Some(device_number),
            ..Self::default()
        }
    }

    pub fn by_path(device_path: impl Into<String>) -> Self {
        Self {
            device_path: Some(device_path.into()),
            ..Self::default()
        }
    }
}

/// Builds [`PhysicalDiskInfo`] records from device numbers, paths, drive
/// letters or volume names.
pub struct DiskResolver<'a, B: StorageBackend> {
    backend: &'a B,
    privilege: Privilege,
    device_classes: Vec<DeviceClass>,
}

impl<'a, B: StorageBackend> DiskResolver<'a, B> {
    pub fn new(backend: &'a B, privilege: Privilege) -> Self {
        Self {
            backend,
            privilege,
            device_classes: DeviceClass::storage_classes(),
        }
    }

    /// `detected` is used unless the options pin a privilege level.
    pub fn with_options(backend: &'a B, options: &ResolverOptions, detected: Privilege) -> Self {
        Self {
            backend,
            privilege: options.effective_privilege(detected),
            device_classes: options.device_classes.clone(),
        }
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn from_device_number(&self, device_number: u32) -> Result<Option<PhysicalDiskInfo>, TopologyError> {
        self.resolve(ResolveRequest::by_number(device_number))
    }

    /// Accepts `\\.\PhysicalDrive0`, `C`, `C:`, `C:\`, `\\?\Volume{...}\` or
    /// a bus-enumerated device path.
    ///
    /// Each call sweeps every disk and volume on the system; when records for
    /// many drives are needed use [`DiskResolver::enumerate_physical_disks`].
    pub fn from_device_path(&self, device_path: &str) -> Result<Option<PhysicalDiskInfo>, TopologyError> {
        self.resolve(ResolveRequest::by_path(device_path))
    }

    /// Resolves the disk described by `request`.
    ///
    /// Returns `Ok(None)` when no such device exists.
    pub fn resolve(&self, request: ResolveRequest) -> Result<Option<PhysicalDiskInfo>, TopologyError> {
        let ResolveRequest {
            device_number,
            mut device_path,
            storage_device_info,
            device_info,
        } = request;

        let path_missing = device_path.as_deref().map_or(true, |p| p.trim().is_empty());
        if device_number.is_none() && path_missing {
            if let Some(info) = &device_info {
                device_path = Some(info.device_path.clone());
            }
        }

        let identifier = match (device_number, device_path) {
            (Some(number), _) => physical_drive_path(number),
            (None, Some(path)) => path,
            (None, None) => {
                return Err(TopologyError::InvalidPath(
                    "neither a device number nor a device path was given".to_string(),
                ))
            }
        };

        // Drives come back as their local device path, `\\.\C:`.
        let classified = classify(&identifier)?;

        let (storage, physical_drive) = match storage_device_info {
            Some(info) => (info, None),
            None => {
                let found = match get_storage_device_info(
                    self.backend,
                    self.privilege,
                    classified.is_device(),
                    device_number.map(DeviceTarget::number),
                    classified.path(),
                ) {
                    Ok(found) => found,
                    Err(TopologyError::DeviceNotFound(reason)) => {
                        log::info!("No storage device behind {}: {}", identifier, reason);
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                };
                match found {
                    Some(found) => (found.info, found.physical_drive_path),
                    None => {
                        log::info!("{} is not a storage device", identifier);
                        return Ok(None);
                    }
                }
            }
        };

        let device_number = device_number.unwrap_or(storage.device_number);
        let target = DeviceTarget {
            device_number,
            device_type: Some(storage.device_type),
        };

        let device_info = match device_info {
            Some(info) => info,
            None => match find_device_info(self.backend, self.privilege, &self.device_classes, target)? {
                Some(info) => info,
                None => {
                    log::info!("No device descriptor for device number {}", device_number);
                    return Ok(None);
                }
            },
        };

        // Adapter and partition queries go to the owning device, not to the
        // volume the caller named.
        let classified = match physical_drive {
            Some(path) => classify(&path)?,
            None => classified,
        };

        let dos_device_name = self.backend.query_dos_device(regular_path(classified.path()))?;

        let (storage_adapter_info, storage_partition_info) = {
            let handle = self
                .backend
                .open_device(classified.path(), self.privilege.access_mode())?;
            let adapter = handle.adapter_info(
                device_number,
                device_info.bus_reported_device_description.as_deref(),
            )?;
            let partition = handle.partition_info(device_number)?;
            (adapter, partition)
        };

        let (partition_indexes, volume_guids, logical_drives) =
            populate_topology(self.backend, self.privilege, target)?.into_parts();

        let mut storage_device_info = storage;

        // The device-level size query needs elevation; the partition and
        // volume size queries do not.
        if !self.privilege.is_elevated() && storage_device_info.total_size == 0 {
            if let Some(partition) = &storage_partition_info {
                storage_device_info.total_size = if classified.is_device() {
                    partition.total_size
                } else {
                    let root = classified.root_directory();
                    match self.backend.volume_total_size(&root) {
                        Ok(size) => size,
                        Err(e) => {
                            log::warn!("Total size of {} is unknown: {}", root, e);
                            0
                        }
                    }
                };
            }
        }

        let disk = PhysicalDiskInfo {
            name: device_info.display_name().map(str::to_string),
            device_path: device_info.device_path,
            dos_device_name,
            physical_device_object_name: device_info.physical_device_object_name,
            partition_indexes,
            volume_guids,
            logical_drives,
            storage_adapter_info,
            storage_device_info,
            storage_partition_info,
        };

        log::info!(
            "Resolved {} to disk {} ({} volume(s))",
            identifier,
            disk.device_number(),
            disk.volume_guids.len()
        );

        Ok(Some(disk))
    }

    /// Resolves every disk-class device on the system, in enumeration order.
    pub fn enumerate_physical_disks(&self) -> Result<Vec<PhysicalDiskInfo>, TopologyError> {
        let mut disks = Vec::new();

        for device in self.backend.enumerate_devices(&[DeviceClass::Disk])? {
            let found = match get_storage_device_info(self.backend, self.privilege, true, None, &device.device_path) {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) if e.is_permission_failure() => return Err(e),
                Err(e) => {
                    log::debug!("Skipping {}: {}", device.device_path, e);
                    continue;
                }
            };

            let request = ResolveRequest {
                device_number: Some(found.info.device_number),
                device_path: None,
                storage_device_info: Some(found.info),
                device_info: Some(device),
            };

            match self.resolve(request) {
                Ok(Some(disk)) => disks.push(disk),
                Ok(None) => {}
                Err(TopologyError::DeviceNotFound(reason)) => {
                    log::debug!("Disk {} vanished: {}", found.info.device_number, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(disks)
    }
}
