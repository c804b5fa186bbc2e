use super::handle::{from_wide, wide};
use disktopo_core::TopologyError;
use std::ptr::null_mut;
use winapi::shared::minwindef::{DWORD, MAX_PATH};
use winapi::shared::winerror::{ERROR_FILE_NOT_FOUND, ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA, ERROR_NO_MORE_FILES};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::fileapi::{
    FindFirstVolumeW, FindNextVolumeW, FindVolumeClose, GetDiskFreeSpaceExW, GetVolumePathNamesForVolumeNameW,
    QueryDosDeviceW,
};
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::{HANDLE, ULARGE_INTEGER};

/// Volume names in `\\?\Volume{GUID}\` form, read one at a time.
pub struct Volumes {
    handle: HANDLE,
    pending: Option<String>,
}

impl Volumes {
    pub fn new() -> Result<Self, TopologyError> {
        let mut buffer = [0u16; MAX_PATH + 1];
        let handle = unsafe { FindFirstVolumeW(buffer.as_mut_ptr(), buffer.len() as DWORD) };

        if handle == INVALID_HANDLE_VALUE {
            let error = unsafe { GetLastError() };
            if error == ERROR_NO_MORE_FILES {
                return Ok(Self { handle, pending: None });
            }
            return Err(TopologyError::Other(format!("FindFirstVolumeW failed: error code {}", error)));
        }

        Ok(Self {
            handle,
            pending: Some(from_wide(&buffer)),
        })
    }
}

impl Iterator for Volumes {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let current = self.pending.take()?;

        let mut buffer = [0u16; MAX_PATH + 1];
        let ok = unsafe { FindNextVolumeW(self.handle, buffer.as_mut_ptr(), buffer.len() as DWORD) };
        if ok != 0 {
            self.pending = Some(from_wide(&buffer));
        } else {
            let error = unsafe { GetLastError() };
            if error != ERROR_NO_MORE_FILES {
                log::warn!("Volume enumeration stopped: error code {}", error);
            }
        }

        Some(current)
    }
}

impl Drop for Volumes {
    fn drop(&mut self) {
        if self.handle != INVALID_HANDLE_VALUE {
            unsafe {
                FindVolumeClose(self.handle);
            }
        }
    }
}

/// Splits a double-NUL-terminated string list.
fn multi_string(buffer: &[u16]) -> Vec<String> {
    buffer
        .split(|&c| c == 0)
        .take_while(|s| !s.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// First path the volume is mounted at.
pub fn first_mount_point(volume: &str) -> Result<Option<String>, TopologyError> {
    let name = if volume.ends_with('\\') {
        volume.to_string()
    } else {
        format!("{}\\", volume)
    };
    let wide_name = wide(&name);
    let mut size = MAX_PATH + 1;

    loop {
        let mut buffer = vec![0u16; size];
        let mut required: DWORD = 0;
        let ok = unsafe {
            GetVolumePathNamesForVolumeNameW(
                wide_name.as_ptr(),
                buffer.as_mut_ptr(),
                buffer.len() as DWORD,
                &mut required,
            )
        };

        if ok != 0 {
            return Ok(multi_string(&buffer).into_iter().next());
        }

        let error = unsafe { GetLastError() };
        if error == ERROR_MORE_DATA && (required as usize) > size {
            size = required as usize;
            continue;
        }
        return Err(TopologyError::DeviceNotFound(format!(
            "{} has no mount points (error code {})",
            volume, error
        )));
    }
}

/// Target of a DOS device name, e.g. `PhysicalDrive0` -> `\Device\Harddisk0\DR0`.
pub fn query_dos_device(device_name: &str) -> Result<Option<String>, TopologyError> {
    let wide_name = wide(device_name);
    let mut size = MAX_PATH + 1;

    loop {
        let mut buffer = vec![0u16; size];
        let written = unsafe { QueryDosDeviceW(wide_name.as_ptr(), buffer.as_mut_ptr(), buffer.len() as DWORD) };

        if written != 0 {
            return Ok(multi_string(&buffer).into_iter().next());
        }

        match unsafe { GetLastError() } {
            ERROR_FILE_NOT_FOUND => return Ok(None),
            ERROR_INSUFFICIENT_BUFFER if size < 32 * 1024 => size *= 2,
            error => {
                return Err(TopologyError::Other(format!(
                    "QueryDosDeviceW failed for {}: error code {}",
                    device_name, error
                )))
            }
        }
    }
}

/// Total bytes of the volume mounted at `root`.
pub fn total_bytes(root: &str) -> Result<u64, TopologyError> {
    let wide_root = wide(root);
    let mut total: ULARGE_INTEGER = unsafe { std::mem::zeroed() };

    let ok = unsafe { GetDiskFreeSpaceExW(wide_root.as_ptr(), null_mut(), &mut total, null_mut()) };
    if ok == 0 {
        let error = unsafe { GetLastError() };
        return Err(std::io::Error::from_raw_os_error(error as i32).into());
    }

    Ok(unsafe { *total.QuadPart() })
}
