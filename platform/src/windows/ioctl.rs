// Storage IOCTLs. Output is read from byte buffers at the documented
// offsets of the winioctl.h structures.

use disktopo_core::{PartitionStyle, StorageAdapterInfo, StorageBusType, StorageDeviceNumber, StoragePartitionInfo};
use std::ptr::null_mut;
use uuid::Uuid;
use winapi::shared::minwindef::{DWORD, LPVOID};
use winapi::shared::winerror::{ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::ioapiset::DeviceIoControl;
use winapi::um::winioctl::{
    IOCTL_DISK_GET_DRIVE_GEOMETRY_EX, IOCTL_DISK_GET_DRIVE_LAYOUT_EX, IOCTL_DISK_GET_LENGTH_INFO,
    IOCTL_DISK_GET_PARTITION_INFO_EX, IOCTL_STORAGE_GET_DEVICE_NUMBER, IOCTL_STORAGE_QUERY_PROPERTY,
};
use winapi::um::winnt::HANDLE;

const STORAGE_ADAPTER_PROPERTY: u32 = 1;
const PROPERTY_STANDARD_QUERY: u32 = 0;

const PARTITION_STYLE_MBR: u32 = 0;
const PARTITION_STYLE_GPT: u32 = 1;

// DRIVE_LAYOUT_INFORMATION_EX header and PARTITION_INFORMATION_EX entry sizes
const LAYOUT_HEADER_SIZE: usize = 48;
const PARTITION_ENTRY_SIZE: usize = 144;

const MAX_LAYOUT_BUFFER: usize = 1024 * 1024;

fn control(handle: HANDLE, code: DWORD, input: Option<&[u8]>, output: &mut [u8]) -> Result<usize, DWORD> {
    let (in_ptr, in_len) = match input {
        Some(input) => (input.as_ptr() as LPVOID, input.len() as DWORD),
        None => (null_mut(), 0),
    };
    let mut returned: DWORD = 0;

    let ok = unsafe {
        DeviceIoControl(
            handle,
            code,
            in_ptr,
            in_len,
            output.as_mut_ptr() as LPVOID,
            output.len() as DWORD,
            &mut returned,
            null_mut(),
        )
    };

    if ok == 0 {
        Err(unsafe { GetLastError() })
    } else {
        Ok(returned as usize)
    }
}

fn read_u16(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buffer[offset], buffer[offset + 1]])
}

fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buffer[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buffer: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buffer[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// STORAGE_DEVICE_NUMBER of the device or volume. `None` when the driver
/// does not implement the query.
pub fn get_device_number(handle: HANDLE) -> Option<StorageDeviceNumber> {
    let mut out = [0u8; 12];
    match control(handle, IOCTL_STORAGE_GET_DEVICE_NUMBER, None, &mut out) {
        Ok(n) if n >= out.len() => Some(StorageDeviceNumber {
            device_type: read_u32(&out, 0),
            device_number: read_u32(&out, 4),
            // 0xFFFFFFFF for devices that cannot be partitioned
            partition_number: read_u32(&out, 8) as i32,
        }),
        Ok(_) => None,
        Err(error) => {
            log::trace!("IOCTL_STORAGE_GET_DEVICE_NUMBER failed: error code {}", error);
            None
        }
    }
}

/// Device length in bytes. Needs a handle opened with read access.
pub fn get_length_info(handle: HANDLE) -> Option<u64> {
    let mut out = [0u8; 8];
    match control(handle, IOCTL_DISK_GET_LENGTH_INFO, None, &mut out) {
        Ok(n) if n >= out.len() => Some(read_u64(&out, 0)),
        Ok(_) => None,
        Err(error) => {
            log::debug!("IOCTL_DISK_GET_LENGTH_INFO failed: error code {}", error);
            None
        }
    }
}

pub fn get_adapter_descriptor(handle: HANDLE, bus_reported_description: Option<&str>) -> Option<StorageAdapterInfo> {
    // STORAGE_PROPERTY_QUERY { PropertyId, QueryType, AdditionalParameters[1] }
    let mut query = [0u8; 12];
    query[0..4].copy_from_slice(&STORAGE_ADAPTER_PROPERTY.to_le_bytes());
    query[4..8].copy_from_slice(&PROPERTY_STANDARD_QUERY.to_le_bytes());

    let mut out = [0u8; 64];
    let returned = match control(handle, IOCTL_STORAGE_QUERY_PROPERTY, Some(&query), &mut out) {
        Ok(n) => n,
        Err(error) => {
            log::debug!("StorageAdapterProperty query failed: error code {}", error);
            return None;
        }
    };

    // STORAGE_ADAPTER_DESCRIPTOR up to BusMinorVersion
    if returned < 30 {
        return None;
    }

    Some(StorageAdapterInfo {
        bus_type: StorageBusType::from_raw(out[24]),
        bus_reported_device_description: bus_reported_description.map(str::to_string),
        maximum_transfer_length: read_u32(&out, 8),
        maximum_physical_pages: read_u32(&out, 12),
        alignment_mask: read_u32(&out, 16),
        adapter_uses_pio: out[20] != 0,
        command_queueing: out[22] != 0,
        accelerated_transfer: out[23] != 0,
        bus_version: (read_u16(&out, 26), read_u16(&out, 28)),
    })
}

fn partition_style(raw: u32) -> PartitionStyle {
    match raw {
        PARTITION_STYLE_MBR => PartitionStyle::Mbr,
        PARTITION_STYLE_GPT => PartitionStyle::Gpt,
        _ => PartitionStyle::Raw,
    }
}

struct DriveLayout {
    style: PartitionStyle,
    partition_count: u32,
    disk_id: Option<String>,
}

fn get_drive_layout(handle: HANDLE) -> Option<DriveLayout> {
    let mut size = LAYOUT_HEADER_SIZE + 16 * PARTITION_ENTRY_SIZE;

    loop {
        let mut out = vec![0u8; size];
        match control(handle, IOCTL_DISK_GET_DRIVE_LAYOUT_EX, None, &mut out) {
            Ok(n) if n >= LAYOUT_HEADER_SIZE => {
                let raw_style = read_u32(&out, 0);
                let entries = read_u32(&out, 4) as usize;

                // MBR layouts carry empty slots; count entries with a length.
                let partition_count = (0..entries)
                    .map(|i| LAYOUT_HEADER_SIZE + i * PARTITION_ENTRY_SIZE)
                    .filter(|&offset| offset + PARTITION_ENTRY_SIZE <= n)
                    .filter(|&offset| read_u64(&out, offset + 16) > 0)
                    .count() as u32;

                let disk_id = match raw_style {
                    PARTITION_STYLE_GPT => {
                        let mut guid = [0u8; 16];
                        guid.copy_from_slice(&out[8..24]);
                        Some(Uuid::from_bytes_le(guid).to_string())
                    }
                    PARTITION_STYLE_MBR => Some(format!("{:08X}", read_u32(&out, 8))),
                    _ => None,
                };

                return Some(DriveLayout {
                    style: partition_style(raw_style),
                    partition_count,
                    disk_id,
                });
            }
            Ok(_) => return None,
            Err(ERROR_INSUFFICIENT_BUFFER) | Err(ERROR_MORE_DATA) if size < MAX_LAYOUT_BUFFER => {
                size *= 2;
            }
            Err(error) => {
                log::debug!("IOCTL_DISK_GET_DRIVE_LAYOUT_EX failed: error code {}", error);
                return None;
            }
        }
    }
}

fn get_geometry_size(handle: HANDLE) -> Option<u64> {
    // DISK_GEOMETRY (24 bytes) followed by DiskSize
    let mut out = [0u8; 40];
    match control(handle, IOCTL_DISK_GET_DRIVE_GEOMETRY_EX, None, &mut out) {
        Ok(n) if n >= 32 => Some(read_u64(&out, 24)),
        Ok(_) => None,
        Err(error) => {
            log::trace!("IOCTL_DISK_GET_DRIVE_GEOMETRY_EX failed: error code {}", error);
            None
        }
    }
}

fn get_partition_entry(handle: HANDLE) -> Option<(PartitionStyle, u64)> {
    let mut out = [0u8; PARTITION_ENTRY_SIZE];
    match control(handle, IOCTL_DISK_GET_PARTITION_INFO_EX, None, &mut out) {
        Ok(n) if n >= 24 => Some((partition_style(read_u32(&out, 0)), read_u64(&out, 16))),
        Ok(_) => None,
        Err(error) => {
            log::trace!("IOCTL_DISK_GET_PARTITION_INFO_EX failed: error code {}", error);
            None
        }
    }
}

/// Partition style, partition count and size of the disk or volume behind
/// `handle`. The geometry and partition queries need no access rights, the
/// layout query does; the layout-derived fields fall back when it fails.
pub fn get_partition_info(handle: HANDLE) -> Option<StoragePartitionInfo> {
    let entry = get_partition_entry(handle);
    let geometry_size = get_geometry_size(handle);
    let layout = get_drive_layout(handle);

    if entry.is_none() && geometry_size.is_none() && layout.is_none() {
        return None;
    }

    let partition_style = layout
        .as_ref()
        .map(|l| l.style)
        .or(entry.map(|(style, _)| style))
        .unwrap_or(PartitionStyle::Raw);

    Some(StoragePartitionInfo {
        partition_style,
        partition_count: layout.as_ref().map_or(0, |l| l.partition_count),
        total_size: geometry_size.or(entry.map(|(_, length)| length)).unwrap_or(0),
        disk_id: layout.and_then(|l| l.disk_id),
    })
}
