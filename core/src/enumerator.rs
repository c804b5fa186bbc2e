use crate::backend::StorageBackend;
use crate::device::{DeviceClass, DeviceInfo, DeviceTarget, Privilege};
use crate::query::get_storage_device_info;
use crate::TopologyError;

/// Scans the devices of `classes` for the one `target` names.
///
/// The first match wins; a device number is unique within its device type so
/// a second match would only come from a misbehaving driver. Candidates that cannot be
/// opened are skipped, a permission failure ends the scan.
pub fn find_device_info<B: StorageBackend>(
    backend: &B,
    privilege: Privilege,
    classes: &[DeviceClass],
    target: DeviceTarget,
) -> Result<Option<DeviceInfo>, TopologyError> {
    for device in backend.enumerate_devices(classes)? {
        match get_storage_device_info(backend, privilege, true, Some(target), &device.device_path) {
            Ok(Some(_)) => {
                log::debug!("Device {} is {}", target.device_number, device.device_path);
                return Ok(Some(device));
            }
            Ok(None) => continue,
            Err(e) if e.is_permission_failure() => return Err(e),
            Err(e) => {
                log::debug!("Skipping {}: {}", device.device_path, e);
            }
        }
    }

    log::debug!("No {:?} device answers for {:?}", classes, target);
    Ok(None)
}
