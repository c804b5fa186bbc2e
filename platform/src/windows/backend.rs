use super::handle::WindowsHandle;
use super::setupapi::DeviceInterfaces;
use super::volume::{self, Volumes};
use disktopo_core::{AccessMode, DeviceClass, DeviceInfo, Enumeration, StorageBackend, TopologyError};

/// Storage queries against the running Windows system.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsStorageBackend;

impl WindowsStorageBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for WindowsStorageBackend {
    type Handle = WindowsHandle;

    fn open_device(&self, path: &str, access: AccessMode) -> Result<WindowsHandle, TopologyError> {
        WindowsHandle::open(path, access)
    }

    fn enumerate_devices<'a>(&'a self, classes: &[DeviceClass]) -> Result<Enumeration<'a, DeviceInfo>, TopologyError> {
        let sets = classes
            .iter()
            .map(|&class| DeviceInterfaces::new(class))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(sets.into_iter().flatten()))
    }

    fn enumerate_volumes<'a>(&'a self) -> Result<Enumeration<'a, String>, TopologyError> {
        Ok(Box::new(Volumes::new()?))
    }

    fn volume_display_name(&self, volume: &str) -> Result<Option<String>, TopologyError> {
        volume::first_mount_point(volume)
    }

    fn query_dos_device(&self, device_name: &str) -> Result<Option<String>, TopologyError> {
        volume::query_dos_device(device_name)
    }

    fn volume_total_size(&self, root: &str) -> Result<u64, TopologyError> {
        volume::total_bytes(root)
    }
}
