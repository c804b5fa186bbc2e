use crate::backend::{DeviceHandle, StorageBackend};
use crate::device::{DeviceTarget, Privilege, StorageDeviceInfo};
use crate::path::{classify, owning_device_path};
use crate::TopologyError;

/// A storage device that answered the device-number query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDeviceMatch {
    pub info: StorageDeviceInfo,
    /// `\\.\PhysicalDriveN` or `\\.\CdRomN` of the owning device, set when
    /// the query went through a volume or drive so callers can reopen the
    /// device itself.
    pub physical_drive_path: Option<String>,
}

/// Opens `path` and reads its storage device info.
///
/// Returns `Ok(None)` when the device does not report a device number or
/// when `target` is set and the answer names another device. Open failures
/// are returned as errors; every handle is released before returning.
///
/// For volumes and drives the size is read from the owning device, since a
/// length query on a volume handle measures the volume.
pub fn get_storage_device_info<B: StorageBackend>(
    backend: &B,
    privilege: Privilege,
    is_device_path: bool,
    target: Option<DeviceTarget>,
    path: &str,
) -> Result<Option<StorageDeviceMatch>, TopologyError> {
    let classified = classify(path)?;

    let (number, device_size) = {
        let handle = backend.open_device(classified.path(), privilege.access_mode())?;

        let number = match handle.device_number()? {
            Some(number) => number,
            None => {
                log::debug!("{} does not report a device number", handle.path());
                return Ok(None);
            }
        };

        if let Some(target) = target {
            if !target.matches(&number) {
                return Ok(None);
            }
        }

        let device_size = if is_device_path {
            Some(handle.disk_size()?)
        } else {
            None
        };
        (number, device_size)
    };

    let owner = owning_device_path(number.device_type, number.device_number);

    let total_size = match device_size {
        Some(size) => size,
        None if privilege.is_elevated() => owner_size(backend, privilege, &owner)?,
        None => 0,
    };

    if total_size == 0 && !privilege.is_elevated() {
        log::debug!(
            "Disk size of {} is unavailable without elevation",
            classified.path()
        );
    }

    Ok(Some(StorageDeviceMatch {
        info: StorageDeviceInfo {
            device_type: number.device_type,
            device_number: number.device_number,
            partition_number: number.partition_number,
            total_size,
        },
        physical_drive_path: (!is_device_path).then_some(owner),
    }))
}

fn owner_size<B: StorageBackend>(backend: &B, privilege: Privilege, owner: &str) -> Result<u64, TopologyError> {
    match backend.open_device(owner, privilege.access_mode()) {
        Ok(handle) => handle.disk_size(),
        Err(e) if e.is_permission_failure() => Err(e),
        Err(e) => {
            log::warn!("Cannot open {} for its size: {}", owner, e);
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FILE_DEVICE_CD_ROM, FILE_DEVICE_DISK};
    use crate::test_utils::{FakeDisk, FakeSystem};

    fn system() -> FakeSystem {
        FakeSystem::new()
            .with_disk(
                FakeDisk::new(0, "Fake NVMe 512", 512 * 1_073_741_824)
                    .with_volume(Some('C'), 511 * 1_073_741_824),
            )
            .with_disk(FakeDisk::new(1, "Fake USB Stick", 16 * 1_073_741_824).with_volume(Some('E'), 16 * 1_073_741_824))
    }

    #[test]
    fn test_matching_device_number() {
        let system = system();
        let found = get_storage_device_info(&system, Privilege::Elevated, true, Some(DeviceTarget::number(1)), r"\\.\PhysicalDrive1")
            .unwrap()
            .unwrap();
        assert_eq!(found.info.device_number, 1);
        assert_eq!(found.info.partition_number, 0);
        assert_eq!(found.info.total_size, 16 * 1_073_741_824);
        assert_eq!(found.physical_drive_path, None);
    }

    #[test]
    fn test_mismatched_device_number_is_absent() {
        let system = system();
        let found = get_storage_device_info(&system, Privilege::Elevated, true, Some(DeviceTarget::number(0)), r"\\.\PhysicalDrive1").unwrap();
        assert!(found.is_none());
        assert_eq!(system.open_handles(), 0);
    }

    #[test]
    fn test_volume_query_reports_owning_disk_path() {
        let system = system();
        let found = get_storage_device_info(&system, Privilege::Elevated, false, None, "E:")
            .unwrap()
            .unwrap();
        assert_eq!(found.info.device_number, 1);
        assert_eq!(found.info.partition_number, 1);
        assert_eq!(found.physical_drive_path.as_deref(), Some(r"\\.\PhysicalDrive1"));
    }

    #[test]
    fn test_drive_size_is_read_from_owning_disk() {
        let system = system();
        let found = get_storage_device_info(&system, Privilege::Elevated, false, None, "C:")
            .unwrap()
            .unwrap();
        assert_eq!(found.info.total_size, 512 * 1_073_741_824);
        assert_eq!(system.open_handles(), 0);
    }

    #[test]
    fn test_optical_volume_reports_cdrom_path() {
        let system = system().with_disk(FakeDisk::cdrom(0, "Fake DVD-RW").with_volume(Some('G'), 4_000_000_000));
        let found = get_storage_device_info(&system, Privilege::Elevated, false, None, "G:")
            .unwrap()
            .unwrap();
        assert_eq!(found.info.device_type, FILE_DEVICE_CD_ROM);
        assert_eq!(found.physical_drive_path.as_deref(), Some(r"\\.\CdRom0"));
        assert_eq!(found.info.total_size, 4_700_000_000);
    }

    #[test]
    fn test_target_of_other_device_type_is_absent() {
        let system = system().with_disk(FakeDisk::cdrom(0, "Fake DVD-RW").with_volume(Some('G'), 4_000_000_000));
        let disk_zero = DeviceTarget {
            device_number: 0,
            device_type: Some(FILE_DEVICE_DISK),
        };
        let found = get_storage_device_info(&system, Privilege::Elevated, false, Some(disk_zero), "G:").unwrap();
        assert!(found.is_none());

        let found = get_storage_device_info(&system, Privilege::Elevated, false, Some(disk_zero), "C:").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_size_is_zero_without_elevation() {
        let system = system();
        let found = get_storage_device_info(&system, Privilege::Standard, true, None, r"\\.\PhysicalDrive0")
            .unwrap()
            .unwrap();
        assert_eq!(found.info.total_size, 0);
    }

    #[test]
    fn test_open_failure_propagates() {
        let system = system();
        let result = get_storage_device_info(&system, Privilege::Elevated, true, None, r"\\.\PhysicalDrive7");
        assert!(matches!(result, Err(TopologyError::DeviceNotFound(_))));
    }

    #[test]
    fn test_invalid_path_fails_fast() {
        let system = system();
        let result = get_storage_device_info(&system, Privilege::Elevated, true, None, ":AAAAAAAAAA");
        assert!(matches!(result, Err(TopologyError::InvalidPath(_))));
        assert_eq!(system.opened_count(), 0);
    }
}
