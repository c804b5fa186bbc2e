//! Classification and normalization of device identifiers.
//!
//! Four syntaxes are accepted:
//!
//! * a disk path such as `\\.\PhysicalDrive0`
//! * a drive such as `C`, `C:` or `C:\`
//! * a volume such as `\\?\Volume{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}\`
//! * a bus-enumerated device path such as `\\?\scsi#disk&ven_...#{53f56307-...}`
//!
//! Drives normalize to the local device path `\\.\C:`; everything else is
//! passed through with trailing separators removed.

use crate::device::FILE_DEVICE_CD_ROM;
use crate::TopologyError;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

pub const LOGICAL_DRIVE_PREFIX: &str = r"\\.\";
pub const LONG_PATH_PREFIX: &str = r"\\?\";
pub const PHYSICAL_DRIVE_PREFIX: &str = r"\\.\PhysicalDrive";
pub const CDROM_PREFIX: &str = r"\\.\CdRom";

const VOLUME_NAME_PREFIX: &str = "Volume{";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Drive,
    Volume,
    Device,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Drive => write!(f, "drive"),
            PathKind::Volume => write!(f, "volume"),
            PathKind::Device => write!(f, "device"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedPath {
    path: String,
    kind: PathKind,
}

impl ClassifiedPath {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn is_drive(&self) -> bool {
        self.kind == PathKind::Drive
    }

    pub fn is_volume(&self) -> bool {
        self.kind == PathKind::Volume
    }

    pub fn is_device(&self) -> bool {
        self.kind == PathKind::Device
    }

    /// Root directory form accepted by volume space queries (`C:\`,
    /// `\\?\Volume{...}\`).
    pub fn root_directory(&self) -> String {
        match self.kind {
            PathKind::Drive => format!("{}\\", regular_path(&self.path)),
            PathKind::Volume | PathKind::Device => format!("{}\\", self.path),
        }
    }

}

/// Classifies `raw` as a drive, volume or device path.
pub fn classify(raw: &str) -> Result<ClassifiedPath, TopologyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TopologyError::InvalidPath("empty device path".to_string()));
    }

    if let Some(letter) = drive_letter(trimmed) {
        return Ok(ClassifiedPath {
            path: local_device_path(letter),
            kind: PathKind::Drive,
        });
    }

    let rest = strip_device_prefix(trimmed)
        .ok_or_else(|| TopologyError::InvalidPath(raw.to_string()))?;

    if remove_trailing_separator(rest).is_empty() {
        return Err(TopologyError::InvalidPath(raw.to_string()));
    }

    if let Some(letter) = drive_letter(rest) {
        return Ok(ClassifiedPath {
            path: local_device_path(letter),
            kind: PathKind::Drive,
        });
    }

    let path = remove_trailing_separator(trimmed).to_string();

    if starts_with_ignore_case(rest, VOLUME_NAME_PREFIX) {
        if !is_volume_name(remove_trailing_separator(rest)) {
            return Err(TopologyError::InvalidPath(raw.to_string()));
        }
        return Ok(ClassifiedPath {
            path,
            kind: PathKind::Volume,
        });
    }

    Ok(ClassifiedPath {
        path,
        kind: PathKind::Device,
    })
}

pub fn physical_drive_path(device_number: u32) -> String {
    format!("{}{}", PHYSICAL_DRIVE_PREFIX, device_number)
}

pub fn cdrom_path(device_number: u32) -> String {
    format!("{}{}", CDROM_PREFIX, device_number)
}

/// Path of the whole device behind a device-number answer: `\\.\CdRomN` for
/// optical drives, `\\.\PhysicalDriveN` otherwise.
pub fn owning_device_path(device_type: u32, device_number: u32) -> String {
    match device_type {
        FILE_DEVICE_CD_ROM => cdrom_path(device_number),
        _ => physical_drive_path(device_number),
    }
}

pub fn local_device_path(letter: char) -> String {
    format!("{}{}:", LOGICAL_DRIVE_PREFIX, letter.to_ascii_uppercase())
}

pub fn remove_trailing_separator(path: &str) -> &str {
    path.trim_end_matches(['\\', '/'])
}

/// Strips the `\\.\` or `\\?\` prefix, as expected by DOS device queries.
pub fn regular_path(path: &str) -> &str {
    strip_device_prefix(path).unwrap_or(path)
}

/// Parses the number out of a `\\.\PhysicalDriveN` path.
pub fn device_number_from_path(path: &str) -> Option<u32> {
    let prefix_len = PHYSICAL_DRIVE_PREFIX.len();
    if path.len() <= prefix_len || !starts_with_ignore_case(path, PHYSICAL_DRIVE_PREFIX) {
        return None;
    }
    remove_trailing_separator(&path[prefix_len..]).parse().ok()
}

fn strip_device_prefix(path: &str) -> Option<&str> {
    path.strip_prefix(LOGICAL_DRIVE_PREFIX)
        .or_else(|| path.strip_prefix(LONG_PATH_PREFIX))
}

fn drive_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    match chars.as_str() {
        "" | ":" | ":\\" | ":/" => Some(letter.to_ascii_uppercase()),
        _ => None,
    }
}

fn is_volume_name(name: &str) -> bool {
    let prefix_len = VOLUME_NAME_PREFIX.len();
    name.len() > prefix_len + 1
        && name.ends_with('}')
        && Uuid::parse_str(&name[prefix_len..name.len() - 1]).is_ok()
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}
