use disktopo_core::{
    AccessMode, DeviceClass, DeviceHandle, DeviceInfo, Enumeration, StorageAdapterInfo, StorageBackend,
    StorageDeviceNumber, StoragePartitionInfo, TopologyError,
};

/// Backend for hosts without a disk topology implementation. Every query
/// fails with `PlatformNotSupported`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

/// Never constructed; no device can be opened on an unsupported host.
#[derive(Debug)]
pub enum NoHandle {}

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }

    fn unsupported<T>(&self) -> Result<T, TopologyError> {
        Err(TopologyError::PlatformNotSupported(std::env::consts::OS.to_string()))
    }
}

impl DeviceHandle for NoHandle {
    fn path(&self) -> &str {
        match *self {}
    }

    fn device_number(&self) -> Result<Option<StorageDeviceNumber>, TopologyError> {
        match *self {}
    }

    fn disk_size(&self) -> Result<u64, TopologyError> {
        match *self {}
    }

    fn adapter_info(&self, _: u32, _: Option<&str>) -> Result<Option<StorageAdapterInfo>, TopologyError> {
        match *self {}
    }

    fn partition_info(&self, _: u32) -> Result<Option<StoragePartitionInfo>, TopologyError> {
        match *self {}
    }
}

impl StorageBackend for UnsupportedBackend {
    type Handle = NoHandle;

    fn open_device(&self, _path: &str, _access: AccessMode) -> Result<NoHandle, TopologyError> {
        self.unsupported()
    }

    fn enumerate_devices<'a>(&'a self, _classes: &[DeviceClass]) -> Result<Enumeration<'a, DeviceInfo>, TopologyError> {
        self.unsupported()
    }

    fn enumerate_volumes<'a>(&'a self) -> Result<Enumeration<'a, String>, TopologyError> {
        self.unsupported()
    }

    fn volume_display_name(&self, _volume: &str) -> Result<Option<String>, TopologyError> {
        self.unsupported()
    }

    fn query_dos_device(&self, _device_name: &str) -> Result<Option<String>, TopologyError> {
        self.unsupported()
    }

    fn volume_total_size(&self, _root: &str) -> Result<u64, TopologyError> {
        self.unsupported()
    }
}
