use crate::backend::StorageBackend;
use crate::device::{DeviceTarget, Privilege};
use crate::path::remove_trailing_separator;
use crate::query::get_storage_device_info;
use crate::TopologyError;
use serde::Serialize;

/// Partitions, volumes and drive letters found on one disk, in volume
/// enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    partition_indexes: Vec<i32>,
    volume_guids: Vec<String>,
    logical_drives: Vec<String>,
}

impl Topology {
    pub fn partition_indexes(&self) -> &[i32] {
        &self.partition_indexes
    }

    pub fn volume_guids(&self) -> &[String] {
        &self.volume_guids
    }

    pub fn logical_drives(&self) -> &[String] {
        &self.logical_drives
    }

    pub fn is_empty(&self) -> bool {
        self.volume_guids.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<i32>, Vec<String>, Vec<String>) {
        (self.partition_indexes, self.volume_guids, self.logical_drives)
    }

    // Partition index and volume are always pushed together.
    fn push_volume(&mut self, partition_number: i32, volume: String) {
        self.partition_indexes.push(partition_number);
        self.volume_guids.push(volume);
    }
}

/// Sweeps every volume on the system and keeps those that live on the
/// device named by `target`.
pub fn populate_topology<B: StorageBackend>(
    backend: &B,
    privilege: Privilege,
    target: DeviceTarget,
) -> Result<Topology, TopologyError> {
    let mut topology = Topology::default();

    for volume in backend.enumerate_volumes()? {
        let found = match get_storage_device_info(backend, privilege, false, Some(target), &volume) {
            Ok(Some(found)) => found,
            Ok(None) => continue,
            Err(e) if e.is_permission_failure() => return Err(e),
            Err(e) => {
                log::debug!("Skipping volume {}: {}", volume, e);
                continue;
            }
        };

        let display_name = match backend.volume_display_name(&volume) {
            Ok(name) => name,
            Err(e) => {
                log::debug!("No display name for {}: {}", volume, e);
                None
            }
        };

        topology.push_volume(found.info.partition_number, volume);

        if let Some(name) = display_name.filter(|name| !name.trim().is_empty()) {
            topology
                .logical_drives
                .push(remove_trailing_separator(&name).to_string());
        }
    }

    log::debug!(
        "Device {} has {} volume(s), {} with a drive letter",
        target.device_number,
        topology.volume_guids.len(),
        topology.logical_drives.len()
    );

    Ok(topology)
}
