#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

#[cfg(target_os = "windows")]
pub use self::windows::WindowsStorageBackend as PlatformBackend;

#[cfg(not(target_os = "windows"))]
pub use self::unsupported::UnsupportedBackend as PlatformBackend;

use disktopo_core::Privilege;

/// Privilege level of the current process.
#[cfg(target_os = "windows")]
pub fn current_privilege() -> Privilege {
    self::windows::process_privilege()
}

/// Privilege level of the current process.
#[cfg(unix)]
pub fn current_privilege() -> Privilege {
    Privilege::from(nix::unistd::geteuid().is_root())
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn current_privilege() -> Privilege {
    Privilege::Standard
}
