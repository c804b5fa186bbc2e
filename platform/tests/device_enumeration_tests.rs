/// Tests for the platform storage backend
/// On Windows these run against the real disks of the machine

#[cfg(test)]
mod device_enumeration_tests {
    use disktopo_core::{DiskResolver, StorageBackend};
    use disktopo_platform::{current_privilege, PlatformBackend};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_enumeration_finds_system_disk() {
        init_logging();
        let backend = PlatformBackend::new();
        let resolver = DiskResolver::new(&backend, current_privilege());

        let disks = resolver.enumerate_physical_disks().unwrap();
        assert!(!disks.is_empty(), "No disks found!");

        for disk in &disks {
            println!("Found disk {}: {} ({} bytes)", disk.device_number(), disk, disk.total_size());
            assert_eq!(disk.partition_indexes().len(), disk.volume_guids().len());
            assert!(disk.logical_drives().len() <= disk.volume_guids().len());
        }

        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        assert!(
            disks.iter().any(|d| d.logical_drives().iter().any(|l| l.eq_ignore_ascii_case(&system_drive))),
            "System drive {} is not on any enumerated disk!",
            system_drive
        );
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_system_drive_resolves_to_its_disk() {
        init_logging();
        let backend = PlatformBackend::new();
        let resolver = DiskResolver::new(&backend, current_privilege());

        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        let by_drive = resolver.from_device_path(&system_drive).unwrap().unwrap();
        let by_number = resolver.from_device_number(by_drive.device_number()).unwrap().unwrap();

        assert_eq!(by_drive.device_path(), by_number.device_path());
        assert_eq!(by_drive.volume_guids(), by_number.volume_guids());
        assert!(by_drive.total_size() > 0, "Disk {} has zero size!", by_drive);
        assert!(by_drive.dos_device_name().is_some());
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_every_volume_has_guid_form() {
        let backend = PlatformBackend::new();
        for volume in backend.enumerate_volumes().unwrap() {
            assert!(volume.starts_with(r"\\?\Volume{"), "Unexpected volume name {}", volume);
            assert!(volume.ends_with('\\'));
        }
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_missing_disk_is_absent() {
        let backend = PlatformBackend::new();
        let resolver = DiskResolver::new(&backend, current_privilege());
        assert!(resolver.from_device_number(4096).unwrap().is_none());
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_process_privilege_drives_size_query() {
        init_logging();
        let backend = PlatformBackend::new();
        let privilege = current_privilege();
        let resolver = DiskResolver::new(&backend, privilege);
        assert_eq!(resolver.privilege(), privilege);

        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        let found = disktopo_core::get_storage_device_info(&backend, privilege, false, None, &system_drive)
            .unwrap()
            .unwrap();
        if !privilege.is_elevated() {
            assert_eq!(found.info.total_size, 0);
        }
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_drive_size_is_whole_disk_size() {
        let backend = PlatformBackend::new();
        let resolver = DiskResolver::new(&backend, current_privilege());

        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        let by_drive = resolver.from_device_path(&system_drive).unwrap().unwrap();
        let by_number = resolver.from_device_number(by_drive.device_number()).unwrap().unwrap();
        assert_eq!(by_drive.total_size(), by_number.total_size());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_unsupported_host_reports_platform_error() {
        use disktopo_core::TopologyError;

        init_logging();
        let backend = PlatformBackend::new();
        let resolver = DiskResolver::new(&backend, current_privilege());

        let result = resolver.enumerate_physical_disks();
        assert!(matches!(result, Err(TopologyError::PlatformNotSupported(_))));

        let result = resolver.from_device_path("C:");
        assert!(matches!(result, Err(TopologyError::PlatformNotSupported(_))));

        assert!(backend.enumerate_volumes().is_err());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_invalid_path_fails_before_backend() {
        let backend = PlatformBackend::new();
        let resolver = DiskResolver::new(&backend, current_privilege());
        let result = resolver.from_device_path(":AAAAAAAAAA");
        assert!(matches!(result, Err(disktopo_core::TopologyError::InvalidPath(_))));
    }
}
