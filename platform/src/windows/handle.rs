use super::ioctl;
use disktopo_core::{
    AccessMode, DeviceHandle, StorageAdapterInfo, StorageDeviceNumber, StoragePartitionInfo, TopologyError,
};
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr::null_mut;
use winapi::shared::minwindef::DWORD;
use winapi::shared::winerror::ERROR_ACCESS_DENIED;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE, GENERIC_READ, HANDLE};

pub(crate) fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

/// Decodes a NUL-terminated UTF-16 buffer.
pub(crate) fn from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

fn open_error(path: &str, error: DWORD) -> TopologyError {
    match error {
        ERROR_ACCESS_DENIED => TopologyError::AccessDenied(format!("{} (error code {})", path, error)),
        _ => TopologyError::DeviceNotFound(format!("{} (error code {})", path, error)),
    }
}

/// An open device or volume, closed on drop.
#[derive(Debug)]
pub struct WindowsHandle {
    handle: HANDLE,
    path: String,
    access: AccessMode,
}

// The handle is only used for synchronous DeviceIoControl calls.
unsafe impl Send for WindowsHandle {}

impl WindowsHandle {
    /// Opens `path` for reading, or with no access rights at all in probe mode.
    /// Probe handles answer every query except the device length.
    pub fn open(path: &str, access: AccessMode) -> Result<Self, TopologyError> {
        let desired_access = match access {
            AccessMode::Read => GENERIC_READ,
            AccessMode::Probe => 0,
        };
        let wide_path = wide(path);

        let handle = unsafe {
            CreateFileW(
                wide_path.as_ptr(),
                desired_access,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                null_mut(),
                OPEN_EXISTING,
                0,
                null_mut(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            let error = unsafe { GetLastError() };
            log::debug!("CreateFileW failed for {}: error code {}", path, error);
            return Err(open_error(path, error));
        }

        Ok(Self {
            handle,
            path: path.to_string(),
            access,
        })
    }
}

impl Drop for WindowsHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}

impl DeviceHandle for WindowsHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn device_number(&self) -> Result<Option<StorageDeviceNumber>, TopologyError> {
        Ok(ioctl::get_device_number(self.handle))
    }

    fn disk_size(&self) -> Result<u64, TopologyError> {
        if self.access != AccessMode::Read {
            return Ok(0);
        }
        Ok(ioctl::get_length_info(self.handle).unwrap_or(0))
    }

    fn adapter_info(
        &self,
        device_number: u32,
        bus_reported_description: Option<&str>,
    ) -> Result<Option<StorageAdapterInfo>, TopologyError> {
        let info = ioctl::get_adapter_descriptor(self.handle, bus_reported_description);
        if info.is_none() {
            log::debug!("No adapter descriptor for device {} ({})", device_number, self.path);
        }
        Ok(info)
    }

    fn partition_info(&self, device_number: u32) -> Result<Option<StoragePartitionInfo>, TopologyError> {
        let info = ioctl::get_partition_info(self.handle);
        if info.is_none() {
            log::debug!("No partition information for device {} ({})", device_number, self.path);
        }
        Ok(info)
    }
}
