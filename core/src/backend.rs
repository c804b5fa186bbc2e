use crate::device::{
    AccessMode, DeviceClass, DeviceInfo, StorageAdapterInfo, StorageDeviceNumber,
    StoragePartitionInfo,
};
use crate::TopologyError;

/// Lazy, single-pass sequence produced by a system enumeration.
pub type Enumeration<'a, T> = Box<dyn Iterator<Item = T> + 'a>;

/// An open device or volume handle. Implementations release the underlying
/// OS handle when dropped.
pub trait DeviceHandle {
    /// The path the handle was opened with.
    fn path(&self) -> &str;

    /// Device and partition number of the object behind the handle, or `None`
    /// when the driver does not answer the query.
    fn device_number(&self) -> Result<Option<StorageDeviceNumber>, TopologyError>;

    /// Total size of the disk in bytes. Yields 0 when the handle lacks the
    /// access right the query needs.
    fn disk_size(&self) -> Result<u64, TopologyError>;

    fn adapter_info(
        &self,
        device_number: u32,
        bus_reported_description: Option<&str>,
    ) -> Result<Option<StorageAdapterInfo>, TopologyError>;

    fn partition_info(&self, device_number: u32) -> Result<Option<StoragePartitionInfo>, TopologyError>;
}

/// The operating-system queries the resolver is built on.
pub trait StorageBackend {
    type Handle: DeviceHandle;

    /// Opens `path`. Fails with `AccessDenied` for permission problems and
    /// `DeviceNotFound` for everything else.
    fn open_device(&self, path: &str, access: AccessMode) -> Result<Self::Handle, TopologyError>;

    fn enumerate_devices<'a>(
        &'a self,
        classes: &[DeviceClass],
    ) -> Result<Enumeration<'a, DeviceInfo>, TopologyError>;

    /// Volume identifiers in `\\?\Volume{GUID}\` form.
    fn enumerate_volumes<'a>(&'a self) -> Result<Enumeration<'a, String>, TopologyError>;

    /// First mount point of the volume (`C:\`), if any.
    fn volume_display_name(&self, volume: &str) -> Result<Option<String>, TopologyError>;

    /// NT object name behind a DOS device name such as `PhysicalDrive0`.
    fn query_dos_device(&self, device_name: &str) -> Result<Option<String>, TopologyError>;

    /// Total number of bytes on the volume mounted at `root`.
    fn volume_total_size(&self, root: &str) -> Result<u64, TopologyError>;
}
