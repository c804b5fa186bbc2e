/// In-memory storage system for testing the resolver - NEVER touches real hardware
use crate::backend::{DeviceHandle, Enumeration, StorageBackend};
use crate::device::{
    AccessMode, DeviceClass, DeviceInfo, PartitionStyle, StorageAdapterInfo, StorageBusType,
    StorageDeviceNumber, StoragePartitionInfo, FILE_DEVICE_CD_ROM, FILE_DEVICE_DISK,
};
use crate::path::{classify, device_number_from_path, remove_trailing_separator, PathKind};
use crate::TopologyError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const VOLUME_GUID_BASE: u128 = 0x4c1b02c1_d990_11dc_99ae_806e00000000;

#[derive(Clone, Debug)]
pub struct FakeVolume {
    pub guid: String,
    pub partition_number: i32,
    pub display_name: Option<String>,
    pub size: u64,
}

/// A disk or optical drive of the fake system.
#[derive(Clone, Debug)]
pub struct FakeDisk {
    pub class: DeviceClass,
    pub device_number: u32,
    pub name: Option<String>,
    pub size: u64,
    pub bus_type: StorageBusType,
    pub partition_style: PartitionStyle,
    pub partition_info_available: bool,
    pub device_path: String,
    pub volumes: Vec<FakeVolume>,
}

impl FakeDisk {
    pub fn new(device_number: u32, name: &str, size: u64) -> Self {
        Self {
            class: DeviceClass::Disk,
            device_number,
            name: Some(name.to_string()),
            size,
            bus_type: StorageBusType::Sata,
            partition_style: PartitionStyle::Gpt,
            partition_info_available: true,
            device_path: String::new(),
            volumes: Vec::new(),
        }
    }

    pub fn cdrom(device_number: u32, name: &str) -> Self {
        Self {
            class: DeviceClass::CdRom,
            partition_style: PartitionStyle::Raw,
            bus_type: StorageBusType::Atapi,
            ..Self::new(device_number, name, 4_700_000_000)
        }
    }

    /// Adds a partition with one volume, mounted at `letter` if given.
    pub fn with_volume(self, letter: Option<char>, size: u64) -> Self {
        let display_name = letter.map(|l| format!("{}:\\", l.to_ascii_uppercase()));
        self.push_volume(display_name, size)
    }

    /// Adds a volume whose display name is returned verbatim.
    pub fn with_mounted_volume(self, display_name: &str, size: u64) -> Self {
        self.push_volume(Some(display_name.to_string()), size)
    }

    pub fn with_bus_type(mut self, bus_type: StorageBusType) -> Self {
        self.bus_type = bus_type;
        self
    }

    pub fn without_name(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn without_partition_info(mut self) -> Self {
        self.partition_info_available = false;
        self
    }

    fn push_volume(mut self, display_name: Option<String>, size: u64) -> Self {
        let partition_number = self.volumes.len() as i32 + 1;
        self.volumes.push(FakeVolume {
            guid: String::new(),
            partition_number,
            display_name,
            size,
        });
        self
    }

    fn device_type(&self) -> u32 {
        match self.class {
            DeviceClass::Disk => FILE_DEVICE_DISK,
            DeviceClass::CdRom => FILE_DEVICE_CD_ROM,
        }
    }

    fn whole_device_partition(&self) -> i32 {
        match self.class {
            DeviceClass::Disk => 0,
            DeviceClass::CdRom => -1,
        }
    }

    fn slug(&self) -> String {
        self.name
            .as_deref()
            .unwrap_or("unnamed")
            .to_lowercase()
            .replace(' ', "_")
    }
}

#[derive(Debug, Default)]
struct HandleLedger {
    opened: usize,
    closed: usize,
}

#[derive(Clone, Debug)]
enum FakeTarget {
    Disk(FakeDisk),
    Volume(FakeDisk, FakeVolume),
    Unnumbered(FakeVolume),
}

/// Handle into the fake system; closing is recorded in the ledger on drop.
#[derive(Debug)]
pub struct FakeHandle {
    path: String,
    access: AccessMode,
    target: FakeTarget,
    ledger: Arc<Mutex<HandleLedger>>,
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.ledger.lock().unwrap().closed += 1;
    }
}

impl DeviceHandle for FakeHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn device_number(&self) -> Result<Option<StorageDeviceNumber>, TopologyError> {
        Ok(match &self.target {
            FakeTarget::Disk(disk) => Some(StorageDeviceNumber {
                device_type: disk.device_type(),
                device_number: disk.device_number,
                partition_number: disk.whole_device_partition(),
            }),
            FakeTarget::Volume(disk, volume) => Some(StorageDeviceNumber {
                device_type: disk.device_type(),
                device_number: disk.device_number,
                partition_number: volume.partition_number,
            }),
            FakeTarget::Unnumbered(_) => None,
        })
    }

    fn disk_size(&self) -> Result<u64, TopologyError> {
        if self.access != AccessMode::Read {
            return Ok(0);
        }
        Ok(match &self.target {
            FakeTarget::Disk(disk) => disk.size,
            FakeTarget::Volume(_, volume) | FakeTarget::Unnumbered(volume) => volume.size,
        })
    }

    fn adapter_info(
        &self,
        _device_number: u32,
        bus_reported_description: Option<&str>,
    ) -> Result<Option<StorageAdapterInfo>, TopologyError> {
        let disk = match &self.target {
            FakeTarget::Disk(disk) | FakeTarget::Volume(disk, _) => disk,
            FakeTarget::Unnumbered(_) => return Ok(None),
        };
        Ok(Some(StorageAdapterInfo {
            bus_type: disk.bus_type,
            bus_reported_device_description: bus_reported_description.map(str::to_string),
            maximum_transfer_length: 128 * 1024,
            maximum_physical_pages: 33,
            alignment_mask: 1,
            adapter_uses_pio: false,
            command_queueing: true,
            accelerated_transfer: true,
            bus_version: (1, 0),
        }))
    }

    fn partition_info(&self, _device_number: u32) -> Result<Option<StoragePartitionInfo>, TopologyError> {
        Ok(match &self.target {
            FakeTarget::Disk(disk) if disk.partition_info_available => Some(StoragePartitionInfo {
                partition_style: disk.partition_style,
                partition_count: disk.volumes.len() as u32,
                total_size: disk.size,
                disk_id: Some(Uuid::from_u128(disk.device_number as u128 + 1).to_string()),
            }),
            FakeTarget::Volume(disk, volume) if disk.partition_info_available => Some(StoragePartitionInfo {
                partition_style: disk.partition_style,
                partition_count: 1,
                total_size: volume.size,
                disk_id: None,
            }),
            _ => None,
        })
    }
}

/// Mock storage system that answers every backend query from memory
pub struct FakeSystem {
    disks: Vec<FakeDisk>,
    unnumbered_volumes: Vec<FakeVolume>,
    denied: Mutex<HashSet<String>>,
    unopenable: Mutex<HashSet<String>>,
    ledger: Arc<Mutex<HandleLedger>>,
    device_scans: AtomicUsize,
    next_volume: u128,
}

impl Default for FakeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSystem {
    pub fn new() -> Self {
        Self {
            disks: Vec::new(),
            unnumbered_volumes: Vec::new(),
            denied: Mutex::new(HashSet::new()),
            unopenable: Mutex::new(HashSet::new()),
            ledger: Arc::new(Mutex::new(HandleLedger::default())),
            device_scans: AtomicUsize::new(0),
            next_volume: 0,
        }
    }

    pub fn with_disk(mut self, mut disk: FakeDisk) -> Self {
        let index = self.disks.len();
        disk.device_path = match disk.class {
            DeviceClass::Disk => format!(
                r"\\?\scsi#disk&ven_fake&prod_{}#4&{:x}&0&000000#{{{}}}",
                disk.slug(),
                index,
                DeviceClass::Disk.interface_guid()
            ),
            DeviceClass::CdRom => format!(
                r"\\?\ide#cdromfake_{}#5&{:x}&0&000000#{{{}}}",
                disk.slug(),
                index,
                DeviceClass::CdRom.interface_guid()
            ),
        };
        for volume in &mut disk.volumes {
            volume.guid = self.allocate_volume_guid();
        }
        self.disks.push(disk);
        self
    }

    /// A mounted volume that does not answer the device-number query, like a
    /// network or RAM disk volume.
    pub fn with_unnumbered_volume(mut self, letter: char, size: u64) -> Self {
        let guid = self.allocate_volume_guid();
        self.unnumbered_volumes.push(FakeVolume {
            guid,
            partition_number: 0,
            display_name: Some(format!("{}:\\", letter.to_ascii_uppercase())),
            size,
        });
        self
    }

    /// Opening `path` fails with an access-denied error from now on.
    pub fn deny_access(&self, path: &str) {
        self.denied.lock().unwrap().insert(key(path));
    }

    /// Opening `path` fails as if the device had been removed.
    pub fn make_unopenable(&self, path: &str) {
        self.unopenable.lock().unwrap().insert(key(path));
    }

    pub fn device_path_of(&self, device_number: u32) -> String {
        self.device_info_of(device_number).device_path
    }

    pub fn device_info_of(&self, device_number: u32) -> DeviceInfo {
        self.disks
            .iter()
            .find(|d| d.class == DeviceClass::Disk && d.device_number == device_number)
            .map(|d| self.describe(d))
            .unwrap_or_else(|| panic!("no fake disk {}", device_number))
    }

    /// Volume identifier, with trailing separator, of the volume mounted at
    /// `letter`.
    pub fn volume_guid_of(&self, letter: char) -> String {
        let display_name = format!("{}:\\", letter.to_ascii_uppercase());
        self.all_volumes()
            .find(|v| v.display_name.as_deref() == Some(display_name.as_str()))
            .map(|v| v.guid.clone())
            .unwrap_or_else(|| panic!("no fake volume mounted at {}", letter))
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        let ledger = self.ledger.lock().unwrap();
        ledger.opened - ledger.closed
    }

    /// Handles opened since the system was built.
    pub fn opened_count(&self) -> usize {
        self.ledger.lock().unwrap().opened
    }

    /// Number of device enumerations started.
    pub fn device_scans(&self) -> usize {
        self.device_scans.load(Ordering::SeqCst)
    }

    fn allocate_volume_guid(&mut self) -> String {
        let guid = Uuid::from_u128(VOLUME_GUID_BASE + self.next_volume);
        self.next_volume += 1;
        format!(r"\\?\Volume{{{}}}\", guid)
    }

    fn all_volumes(&self) -> impl Iterator<Item = &FakeVolume> + '_ {
        self.disks
            .iter()
            .flat_map(|d| d.volumes.iter())
            .chain(self.unnumbered_volumes.iter())
    }

    fn describe(&self, disk: &FakeDisk) -> DeviceInfo {
        let index = self
            .disks
            .iter()
            .position(|d| d.device_path == disk.device_path)
            .unwrap_or_default();
        DeviceInfo {
            class: disk.class,
            device_path: disk.device_path.clone(),
            friendly_name: disk.name.clone(),
            device_description: disk.name.as_ref().map(|_| match disk.class {
                DeviceClass::Disk => "Disk drive".to_string(),
                DeviceClass::CdRom => "CD-ROM Drive".to_string(),
            }),
            bus_reported_device_description: disk.name.clone(),
            physical_device_object_name: Some(format!(r"\Device\{:08X}", 0x30 + index)),
        }
    }

    fn locate(&self, path: &str) -> Option<FakeTarget> {
        let classified = classify(path).ok()?;
        match classified.kind() {
            PathKind::Drive => {
                let display_name = format!("{}\\", &classified.path()[4..]);
                self.locate_volume(|v| v.display_name.as_deref() == Some(display_name.as_str()))
            }
            PathKind::Volume => {
                let wanted = key(classified.path());
                self.locate_volume(|v| key(&v.guid) == wanted)
            }
            PathKind::Device => {
                if let Some(number) = device_number_from_path(classified.path()) {
                    return self
                        .disks
                        .iter()
                        .find(|d| d.class == DeviceClass::Disk && d.device_number == number)
                        .cloned()
                        .map(FakeTarget::Disk);
                }
                if let Some(number) = cdrom_number(classified.path()) {
                    return self
                        .disks
                        .iter()
                        .find(|d| d.class == DeviceClass::CdRom && d.device_number == number)
                        .cloned()
                        .map(FakeTarget::Disk);
                }
                let wanted = key(classified.path());
                self.disks
                    .iter()
                    .find(|d| key(&d.device_path) == wanted)
                    .cloned()
                    .map(FakeTarget::Disk)
            }
        }
    }

    fn locate_volume(&self, matches: impl Fn(&FakeVolume) -> bool) -> Option<FakeTarget> {
        for disk in &self.disks {
            if let Some(volume) = disk.volumes.iter().find(|v| matches(v)) {
                return Some(FakeTarget::Volume(disk.clone(), volume.clone()));
            }
        }
        self.unnumbered_volumes
            .iter()
            .find(|v| matches(v))
            .cloned()
            .map(FakeTarget::Unnumbered)
    }
}

impl StorageBackend for FakeSystem {
    type Handle = FakeHandle;

    fn open_device(&self, path: &str, access: AccessMode) -> Result<FakeHandle, TopologyError> {
        let k = key(path);
        if self.denied.lock().unwrap().contains(&k) {
            return Err(TopologyError::AccessDenied(path.to_string()));
        }
        if self.unopenable.lock().unwrap().contains(&k) {
            return Err(TopologyError::DeviceNotFound(path.to_string()));
        }
        let target = self
            .locate(path)
            .ok_or_else(|| TopologyError::DeviceNotFound(path.to_string()))?;

        self.ledger.lock().unwrap().opened += 1;
        Ok(FakeHandle {
            path: path.to_string(),
            access,
            target,
            ledger: Arc::clone(&self.ledger),
        })
    }

    fn enumerate_devices<'a>(
        &'a self,
        classes: &[DeviceClass],
    ) -> Result<Enumeration<'a, DeviceInfo>, TopologyError> {
        self.device_scans.fetch_add(1, Ordering::SeqCst);
        let classes = classes.to_vec();
        Ok(Box::new(classes.into_iter().flat_map(move |class| {
            self.disks
                .iter()
                .filter(move |d| d.class == class)
                .map(move |d| self.describe(d))
        })))
    }

    fn enumerate_volumes<'a>(&'a self) -> Result<Enumeration<'a, String>, TopologyError> {
        Ok(Box::new(self.all_volumes().map(|v| v.guid.clone())))
    }

    fn volume_display_name(&self, volume: &str) -> Result<Option<String>, TopologyError> {
        let wanted = key(volume);
        self.all_volumes()
            .find(|v| key(&v.guid) == wanted)
            .map(|v| v.display_name.clone())
            .ok_or_else(|| TopologyError::DeviceNotFound(volume.to_string()))
    }

    fn query_dos_device(&self, device_name: &str) -> Result<Option<String>, TopologyError> {
        if let Some(number) = device_number_from_path(&format!(r"\\.\{}", device_name)) {
            return Ok(Some(format!(r"\Device\Harddisk{}\DR{}", number, number)));
        }
        if let Some(number) = cdrom_number(&format!(r"\\.\{}", device_name)) {
            return Ok(Some(format!(r"\Device\CdRom{}", number)));
        }
        let display_name = format!("{}\\", device_name.to_ascii_uppercase());
        Ok(self
            .all_volumes()
            .position(|v| v.display_name.as_deref() == Some(display_name.as_str()))
            .map(|index| format!(r"\Device\HarddiskVolume{}", index + 1)))
    }

    fn volume_total_size(&self, root: &str) -> Result<u64, TopologyError> {
        match self.locate(root) {
            Some(FakeTarget::Volume(_, volume)) | Some(FakeTarget::Unnumbered(volume)) => Ok(volume.size),
            _ => Err(TopologyError::DeviceNotFound(root.to_string())),
        }
    }
}

fn key(path: &str) -> String {
    remove_trailing_separator(path.trim()).to_ascii_lowercase()
}

fn cdrom_number(path: &str) -> Option<u32> {
    let lower = path.to_ascii_lowercase();
    lower.strip_prefix(r"\\.\cdrom")?.parse().ok()
}
