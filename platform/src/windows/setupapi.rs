use super::handle::from_wide;
use disktopo_core::{DeviceClass, DeviceInfo, TopologyError};
use std::mem::{size_of, zeroed};
use std::ptr::{null, null_mut};
use uuid::Uuid;
use winapi::shared::devpropdef::{DEVPROPKEY, DEVPROPTYPE, DEVPROP_TYPE_STRING};
use winapi::shared::guiddef::GUID;
use winapi::shared::minwindef::{DWORD, PBYTE};
use winapi::shared::winerror::ERROR_NO_MORE_ITEMS;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::setupapi::{
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
    SetupDiGetDevicePropertyW, SetupDiGetDeviceInterfaceDetailW,
    SetupDiGetDeviceRegistryPropertyW, DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO,
    PSP_DEVICE_INTERFACE_DETAIL_DATA_W, SPDRP_DEVICEDESC, SPDRP_FRIENDLYNAME,
    SPDRP_PHYSICAL_DEVICE_OBJECT_NAME, SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W,
    SP_DEVINFO_DATA,
};

/// DEVPKEY_Device_BusReportedDeviceDesc
const DEVPKEY_BUS_REPORTED_DEVICE_DESC: DEVPROPKEY = DEVPROPKEY {
    fmtid: GUID {
        Data1: 0x540b947e,
        Data2: 0x8b40,
        Data3: 0x45bc,
        Data4: [0xa8, 0xa2, 0x6a, 0x0b, 0x89, 0x4c, 0xbd, 0xa2],
    },
    pid: 4,
};

fn to_guid(uuid: Uuid) -> GUID {
    let (data1, data2, data3, data4) = uuid.as_fields();
    GUID {
        Data1: data1,
        Data2: data2,
        Data3: data3,
        Data4: *data4,
    }
}

/// Present device interfaces of one class, read one at a time. The device
/// information set is destroyed on drop.
pub struct DeviceInterfaces {
    set: HDEVINFO,
    class: DeviceClass,
    guid: GUID,
    index: DWORD,
    finished: bool,
}

impl DeviceInterfaces {
    pub fn new(class: DeviceClass) -> Result<Self, TopologyError> {
        let guid = to_guid(class.interface_guid());
        let set = unsafe { SetupDiGetClassDevsW(&guid, null(), null_mut(), DIGCF_PRESENT | DIGCF_DEVICEINTERFACE) };

        if set == INVALID_HANDLE_VALUE {
            let error = unsafe { GetLastError() };
            return Err(TopologyError::Other(format!(
                "SetupDiGetClassDevsW failed for {:?} interfaces: error code {}",
                class, error
            )));
        }

        Ok(Self {
            set,
            class,
            guid,
            index: 0,
            finished: false,
        })
    }

    fn describe(&self, interface: &mut SP_DEVICE_INTERFACE_DATA) -> Option<DeviceInfo> {
        let mut devinfo: SP_DEVINFO_DATA = unsafe { zeroed() };
        devinfo.cbSize = size_of::<SP_DEVINFO_DATA>() as DWORD;

        let device_path = self.interface_path(interface, &mut devinfo)?;

        let mut info = DeviceInfo::new(self.class, device_path);
        info.friendly_name = self.registry_string(&mut devinfo, SPDRP_FRIENDLYNAME);
        info.device_description = self.registry_string(&mut devinfo, SPDRP_DEVICEDESC);
        info.bus_reported_device_description = self.bus_reported_description(&mut devinfo);
        info.physical_device_object_name = self.registry_string(&mut devinfo, SPDRP_PHYSICAL_DEVICE_OBJECT_NAME);
        Some(info)
    }

    fn interface_path(&self, interface: &mut SP_DEVICE_INTERFACE_DATA, devinfo: &mut SP_DEVINFO_DATA) -> Option<String> {
        let mut required: DWORD = 0;
        unsafe {
            SetupDiGetDeviceInterfaceDetailW(self.set, interface, null_mut(), 0, &mut required, null_mut());
        }
        let header = size_of::<DWORD>();
        if (required as usize) <= header {
            return None;
        }

        // DWORD-aligned storage for SP_DEVICE_INTERFACE_DETAIL_DATA_W
        let mut buffer = vec![0u32; (required as usize + 3) / 4];
        let detail = buffer.as_mut_ptr() as PSP_DEVICE_INTERFACE_DETAIL_DATA_W;

        unsafe {
            (*detail).cbSize = size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as DWORD;
            if SetupDiGetDeviceInterfaceDetailW(self.set, interface, detail, required, null_mut(), devinfo) == 0 {
                log::debug!("SetupDiGetDeviceInterfaceDetailW failed: error code {}", GetLastError());
                return None;
            }
            let chars = (required as usize - header) / 2;
            let path = std::slice::from_raw_parts((*detail).DevicePath.as_ptr(), chars);
            Some(from_wide(path))
        }
    }

    fn registry_string(&self, devinfo: &mut SP_DEVINFO_DATA, property: DWORD) -> Option<String> {
        let mut required: DWORD = 0;
        unsafe {
            SetupDiGetDeviceRegistryPropertyW(self.set, devinfo, property, null_mut(), null_mut(), 0, &mut required);
        }
        if required == 0 {
            return None;
        }

        let mut buffer = vec![0u16; required as usize / 2 + 1];
        let ok = unsafe {
            SetupDiGetDeviceRegistryPropertyW(
                self.set,
                devinfo,
                property,
                null_mut(),
                buffer.as_mut_ptr() as PBYTE,
                (buffer.len() * 2) as DWORD,
                null_mut(),
            )
        };
        if ok == 0 {
            return None;
        }
        Some(from_wide(&buffer)).filter(|s| !s.trim().is_empty())
    }

    fn bus_reported_description(&self, devinfo: &mut SP_DEVINFO_DATA) -> Option<String> {
        let mut property_type: DEVPROPTYPE = 0;
        let mut buffer = [0u16; 256];
        let ok = unsafe {
            SetupDiGetDevicePropertyW(
                self.set,
                devinfo,
                &DEVPKEY_BUS_REPORTED_DEVICE_DESC,
                &mut property_type,
                buffer.as_mut_ptr() as PBYTE,
                (buffer.len() * 2) as DWORD,
                null_mut(),
                0,
            )
        };
        if ok == 0 || property_type != DEVPROP_TYPE_STRING {
            return None;
        }
        Some(from_wide(&buffer)).filter(|s| !s.trim().is_empty())
    }
}

impl Iterator for DeviceInterfaces {
    type Item = DeviceInfo;

    fn next(&mut self) -> Option<DeviceInfo> {
        while !self.finished {
            let mut interface: SP_DEVICE_INTERFACE_DATA = unsafe { zeroed() };
            interface.cbSize = size_of::<SP_DEVICE_INTERFACE_DATA>() as DWORD;

            let ok = unsafe { SetupDiEnumDeviceInterfaces(self.set, null_mut(), &self.guid, self.index, &mut interface) };
            if ok == 0 {
                let error = unsafe { GetLastError() };
                if error != ERROR_NO_MORE_ITEMS {
                    log::warn!("Device interface enumeration stopped: error code {}", error);
                }
                self.finished = true;
                break;
            }

            self.index += 1;
            if let Some(info) = self.describe(&mut interface) {
                return Some(info);
            }
        }
        None
    }
}

impl Drop for DeviceInterfaces {
    fn drop(&mut self) {
        unsafe {
            SetupDiDestroyDeviceInfoList(self.set);
        }
    }
}
