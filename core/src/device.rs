use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// FILE_DEVICE_* codes reported by the device-number query.
pub const FILE_DEVICE_CD_ROM: u32 = 0x02;
pub const FILE_DEVICE_DISK: u32 = 0x07;

/// Device interface class for whole disks (GUID_DEVINTERFACE_DISK).
pub const GUID_DEVINTERFACE_DISK: Uuid = Uuid::from_u128(0x53f56307_b6bf_11d0_94f2_00a0c91efb8b);

/// Device interface class for optical drives (GUID_DEVINTERFACE_CDROM).
pub const GUID_DEVINTERFACE_CDROM: Uuid = Uuid::from_u128(0x53f56308_b6bf_11d0_94f2_00a0c91efb8b);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Disk,
    CdRom,
}

impl DeviceClass {
    pub fn interface_guid(&self) -> Uuid {
        match self {
            DeviceClass::Disk => GUID_DEVINTERFACE_DISK,
            DeviceClass::CdRom => GUID_DEVINTERFACE_CDROM,
        }
    }

    /// Classes scanned when looking for the device behind a device number.
    pub fn storage_classes() -> Vec<DeviceClass> {
        vec![DeviceClass::Disk, DeviceClass::CdRom]
    }
}

/// Bus-level descriptor of an enumerated device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub class: DeviceClass,
    pub device_path: String,
    pub friendly_name: Option<String>,
    pub device_description: Option<String>,
    pub bus_reported_device_description: Option<String>,
    pub physical_device_object_name: Option<String>,
}

impl DeviceInfo {
    pub fn new(class: DeviceClass, device_path: impl Into<String>) -> Self {
        Self {
            class,
            device_path: device_path.into(),
            friendly_name: None,
            device_description: None,
            bus_reported_device_description: None,
            physical_device_object_name: None,
        }
    }

    /// The name shown to users: friendly name, then the device description.
    pub fn display_name(&self) -> Option<&str> {
        self.friendly_name
            .as_deref()
            .or(self.device_description.as_deref())
    }
}

/// Raw answer of the device-number query on an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageDeviceNumber {
    pub device_type: u32,
    pub device_number: u32,
    pub partition_number: i32,
}

/// The device a storage query has to answer for. Disks and optical drives
/// are numbered independently, so a number alone can name two devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTarget {
    pub device_number: u32,
    /// FILE_DEVICE_* code; `None` accepts any type.
    pub device_type: Option<u32>,
}

impl DeviceTarget {
    pub fn number(device_number: u32) -> Self {
        Self {
            device_number,
            device_type: None,
        }
    }

    pub fn of(info: &StorageDeviceInfo) -> Self {
        Self {
            device_number: info.device_number,
            device_type: Some(info.device_type),
        }
    }

    pub fn matches(&self, answer: &StorageDeviceNumber) -> bool {
        answer.device_number == self.device_number
            && self.device_type.map_or(true, |t| t == answer.device_type)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StorageDeviceInfo {
    /// FILE_DEVICE_* code reported by the driver.
    pub device_type: u32,
    pub device_number: u32,
    /// `-1` when the device is not partitionable.
    pub partition_number: i32,
    /// Zero when the size query was made without elevation.
    pub total_size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StorageBusType {
    Unknown,
    Scsi,
    Atapi,
    Ata,
    Ieee1394,
    Ssa,
    Fibre,
    Usb,
    Raid,
    Iscsi,
    Sas,
    Sata,
    Sd,
    Mmc,
    Virtual,
    FileBackedVirtual,
    Spaces,
    Nvme,
    Scm,
    Ufs,
    Other(u8),
}

impl StorageBusType {
    /// Maps a STORAGE_BUS_TYPE value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0x00 => StorageBusType::Unknown,
            0x01 => StorageBusType::Scsi,
            0x02 => StorageBusType::Atapi,
            0x03 => StorageBusType::Ata,
            0x04 => StorageBusType::Ieee1394,
            0x05 => StorageBusType::Ssa,
            0x06 => StorageBusType::Fibre,
            0x07 => StorageBusType::Usb,
            0x08 => StorageBusType::Raid,
            0x09 => StorageBusType::Iscsi,
            0x0A => StorageBusType::Sas,
            0x0B => StorageBusType::Sata,
            0x0C => StorageBusType::Sd,
            0x0D => StorageBusType::Mmc,
            0x0E => StorageBusType::Virtual,
            0x0F => StorageBusType::FileBackedVirtual,
            0x10 => StorageBusType::Spaces,
            0x11 => StorageBusType::Nvme,
            0x12 => StorageBusType::Scm,
            0x13 => StorageBusType::Ufs,
            other => StorageBusType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StorageAdapterInfo {
    pub bus_type: StorageBusType,
    pub bus_reported_device_description: Option<String>,
    pub maximum_transfer_length: u32,
    pub maximum_physical_pages: u32,
    pub alignment_mask: u32,
    pub adapter_uses_pio: bool,
    pub command_queueing: bool,
    pub accelerated_transfer: bool,
    pub bus_version: (u16, u16),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStyle {
    Mbr,
    Gpt,
    Raw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StoragePartitionInfo {
    pub partition_style: PartitionStyle,
    pub partition_count: u32,
    /// Readable without elevation, unlike the device-level size.
    pub total_size: u64,
    /// GPT disk GUID, or the MBR signature as eight hex digits.
    pub disk_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    Elevated,
    #[default]
    Standard,
}

impl Privilege {
    pub fn is_elevated(&self) -> bool {
        matches!(self, Privilege::Elevated)
    }

    /// Handle access right used for device queries at this privilege level.
    pub fn access_mode(&self) -> AccessMode {
        match self {
            Privilege::Elevated => AccessMode::Read,
            Privilege::Standard => AccessMode::Probe,
        }
    }
}

impl From<bool> for Privilege {
    fn from(elevated: bool) -> Self {
        if elevated {
            Privilege::Elevated
        } else {
            Privilege::Standard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Generic read access; needs elevation for disk objects.
    Read,
    /// No data access, enough to issue metadata IOCTLs.
    Probe,
}
