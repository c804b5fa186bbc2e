pub mod backend;
pub mod config;
pub mod device;
pub mod disk;
pub mod enumerator;
pub mod error;
pub mod path;
pub mod query;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod topology;

pub use backend::{DeviceHandle, Enumeration, StorageBackend};
pub use config::ResolverOptions;
pub use device::{
    AccessMode, DeviceClass, DeviceInfo, DeviceTarget, PartitionStyle, Privilege, StorageAdapterInfo, StorageBusType,
    StorageDeviceInfo, StorageDeviceNumber, StoragePartitionInfo, FILE_DEVICE_CD_ROM, FILE_DEVICE_DISK,
};
pub use disk::{DiskResolver, PhysicalDiskInfo, ResolveRequest};
pub use error::TopologyError;
pub use path::{classify, owning_device_path, ClassifiedPath, PathKind};
pub use query::{get_storage_device_info, StorageDeviceMatch};
pub use topology::{populate_topology, Topology};
