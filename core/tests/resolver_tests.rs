// Resolver behavior against the in-memory storage system

use disktopo_core::test_utils::{FakeDisk, FakeSystem};
use disktopo_core::{
    DeviceClass, DiskResolver, PartitionStyle, Privilege, ResolveRequest, ResolverOptions, StorageBusType,
    TopologyError, FILE_DEVICE_CD_ROM,
};

const GB: u64 = 1_073_741_824;

fn workstation() -> FakeSystem {
    FakeSystem::new()
        .with_disk(
            FakeDisk::new(0, "Fake NVMe 512", 512 * GB)
                .with_bus_type(StorageBusType::Nvme)
                .with_volume(None, GB / 2)
                .with_volume(Some('C'), 480 * GB)
                .with_volume(None, GB),
        )
        .with_disk(
            FakeDisk::new(1, "Fake SATA 2TB", 2048 * GB)
                .with_volume(Some('D'), 1024 * GB)
                .with_volume(Some('F'), 1024 * GB),
        )
        .with_disk(
            FakeDisk::new(2, "Fake USB Stick", 32 * GB)
                .with_bus_type(StorageBusType::Usb)
                .with_volume(Some('E'), 32 * GB),
        )
        .with_disk(FakeDisk::cdrom(0, "Fake DVD-RW").with_volume(Some('G'), 4 * GB))
}

#[test]
fn test_resolve_by_device_number() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disk = resolver.from_device_number(1).unwrap().unwrap();
    assert_eq!(disk.name(), Some("Fake SATA 2TB"));
    assert_eq!(disk.device_number(), 1);
    assert_eq!(disk.device_path(), system.device_path_of(1));
    assert_eq!(disk.dos_device_name(), Some(r"\Device\Harddisk1\DR1"));
    assert_eq!(disk.total_size(), 2048 * GB);
    assert_eq!(disk.partition_indexes(), &[1, 2]);
    assert_eq!(disk.logical_drives(), &["D:".to_string(), "F:".to_string()]);
    assert_eq!(
        disk.volume_guids(),
        &[
            system.volume_guid_of('D'),
            system.volume_guid_of('F')
        ]
    );

    let partitions = disk.storage_partition_info().unwrap();
    assert_eq!(partitions.partition_style, PartitionStyle::Gpt);
    assert_eq!(partitions.partition_count, 2);
    assert_eq!(system.open_handles(), 0);
}

#[test]
fn test_topology_counts_are_consistent() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    for number in 0..3 {
        let disk = resolver.from_device_number(number).unwrap().unwrap();
        assert_eq!(disk.partition_indexes().len(), disk.volume_guids().len());
        assert!(disk.logical_drives().len() <= disk.volume_guids().len());
    }

    let system_disk = resolver.from_device_number(0).unwrap().unwrap();
    assert_eq!(system_disk.volume_guids().len(), 3);
    assert_eq!(system_disk.logical_drives(), &["C:".to_string()]);
}

#[test]
fn test_drive_and_device_number_resolve_to_same_disk() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let by_number = resolver.from_device_number(0).unwrap().unwrap();
    for drive in ["C", "c:", "C:\\", r"\\.\C:"] {
        let by_drive = resolver.from_device_path(drive).unwrap().unwrap();
        assert_eq!(by_drive.device_number(), by_number.device_number());
        assert_eq!(by_drive.volume_guids(), by_number.volume_guids());
        assert_eq!(by_drive.device_path(), by_number.device_path());
        assert_eq!(by_drive.total_size(), by_number.total_size());
        // The drive query reports the partition behind the letter.
        assert_eq!(by_drive.storage_device_info().partition_number, 2);
    }
}

#[test]
fn test_resolve_by_volume_name() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disk = resolver.from_device_path(&system.volume_guid_of('E')).unwrap().unwrap();
    assert_eq!(disk.device_number(), 2);
    assert_eq!(disk.logical_drives(), &["E:".to_string()]);
    assert_eq!(disk.storage_adapter_info().unwrap().bus_type, StorageBusType::Usb);
}

#[test]
fn test_resolve_by_device_path() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disk = resolver.from_device_path(&system.device_path_of(2)).unwrap().unwrap();
    assert_eq!(disk.device_number(), 2);
    assert_eq!(disk.name(), Some("Fake USB Stick"));
}

#[test]
fn test_resolve_optical_drive() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let drive = resolver.from_device_path(r"\\.\CdRom0").unwrap().unwrap();
    assert_eq!(drive.name(), Some("Fake DVD-RW"));
    assert_ne!(drive.device_path(), system.device_path_of(0));
    assert_eq!(drive.storage_device_info().device_type, FILE_DEVICE_CD_ROM);
    assert_eq!(drive.storage_device_info().partition_number, -1);
    assert_eq!(drive.dos_device_name(), Some(r"\Device\CdRom0"));
    assert_eq!(drive.logical_drives(), &["G:".to_string()]);
    assert_eq!(drive.volume_guids(), &[system.volume_guid_of('G')]);
    assert_eq!(drive.storage_adapter_info().unwrap().bus_type, StorageBusType::Atapi);
}

#[test]
fn test_optical_drive_letter_resolves_to_optical_drive() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let by_letter = resolver.from_device_path("G:").unwrap().unwrap();
    let by_path = resolver.from_device_path(r"\\.\CdRom0").unwrap().unwrap();
    assert_eq!(by_letter.device_path(), by_path.device_path());
    assert_eq!(by_letter.name(), Some("Fake DVD-RW"));
    assert_eq!(by_letter.dos_device_name(), Some(r"\Device\CdRom0"));
    assert_eq!(by_letter.total_size(), by_path.total_size());
}

#[test]
fn test_disk_topology_excludes_optical_volume_with_same_number() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disk = resolver.from_device_number(0).unwrap().unwrap();
    assert_eq!(disk.name(), Some("Fake NVMe 512"));
    assert_eq!(disk.partition_indexes(), &[1, 2, 3]);
    assert_eq!(disk.logical_drives(), &["C:".to_string()]);
    assert!(!disk.volume_guids().contains(&system.volume_guid_of('G')));
}

#[test]
fn test_nonexistent_device_number_is_absent() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    assert!(resolver.from_device_number(9).unwrap().is_none());
    assert_eq!(system.open_handles(), 0);
}

#[test]
fn test_unmounted_drive_letter_is_absent() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    assert!(resolver.from_device_path("Q:").unwrap().is_none());
}

#[test]
fn test_volume_without_device_number_is_absent() {
    let system = workstation().with_unnumbered_volume('Z', 4 * GB);
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    assert!(resolver.from_device_path("Z:").unwrap().is_none());

    // The sweep passes over it as well.
    let disk = resolver.from_device_number(2).unwrap().unwrap();
    assert_eq!(disk.volume_guids().len(), 1);
}

#[test]
fn test_invalid_path_is_rejected() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let result = resolver.from_device_path(":AAAAAAAAAA");
    assert!(matches!(result, Err(TopologyError::InvalidPath(_))));
    assert_eq!(system.opened_count(), 0);
}

#[test]
fn test_size_falls_back_to_partition_total_without_elevation() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Standard);

    let disk = resolver.from_device_number(0).unwrap().unwrap();
    let partitions = disk.storage_partition_info().unwrap();
    assert_eq!(disk.total_size(), partitions.total_size);
    assert_eq!(disk.total_size(), 512 * GB);

    // A drive letter is reopened as its disk, so the disk total applies too.
    let by_drive = resolver.from_device_path("E").unwrap().unwrap();
    assert_eq!(by_drive.total_size(), 32 * GB);
}

#[test]
fn test_size_falls_back_to_volume_space_for_supplied_drive_info() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Standard);

    let found = disktopo_core::get_storage_device_info(&system, Privilege::Standard, false, None, "C:")
        .unwrap()
        .unwrap();
    assert_eq!(found.info.total_size, 0);

    let disk = resolver
        .resolve(ResolveRequest {
            device_path: Some("C:".to_string()),
            storage_device_info: Some(found.info),
            ..ResolveRequest::default()
        })
        .unwrap()
        .unwrap();

    assert_eq!(disk.device_number(), 0);
    assert_eq!(disk.total_size(), 480 * GB);
}

#[test]
fn test_size_stays_zero_without_partition_info() {
    let system = FakeSystem::new().with_disk(
        FakeDisk::new(0, "Fake Virtual Disk", 64 * GB)
            .with_volume(Some('V'), 64 * GB)
            .without_partition_info(),
    );
    let resolver = DiskResolver::new(&system, Privilege::Standard);

    let disk = resolver.from_device_number(0).unwrap().unwrap();
    assert_eq!(disk.total_size(), 0);
    assert!(disk.storage_partition_info().is_none());
}

#[test]
fn test_elevated_size_is_reported_directly() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disk = resolver.from_device_path("D:").unwrap().unwrap();
    assert_eq!(disk.total_size(), 2048 * GB);
}

#[test]
fn test_supplied_descriptor_skips_device_scan() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let request = ResolveRequest {
        device_number: Some(1),
        device_info: Some(system.device_info_of(1)),
        ..ResolveRequest::default()
    };
    let disk = resolver.resolve(request).unwrap().unwrap();
    assert_eq!(disk.device_number(), 1);
    assert_eq!(system.device_scans(), 0);

    resolver.from_device_number(1).unwrap().unwrap();
    assert_eq!(system.device_scans(), 1);
}

#[test]
fn test_handles_released_after_every_outcome() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    resolver.from_device_number(0).unwrap().unwrap();
    assert_eq!(system.open_handles(), 0);

    assert!(resolver.from_device_number(42).unwrap().is_none());
    assert_eq!(system.open_handles(), 0);

    system.deny_access(&system.device_path_of(2));
    let result = resolver.from_device_number(2);
    assert!(matches!(result, Err(TopologyError::AccessDenied(_))));
    assert_eq!(system.open_handles(), 0);
    assert!(system.opened_count() > 0);
}

#[test]
fn test_access_denied_on_disk_propagates() {
    let system = workstation();
    system.deny_access(r"\\.\PhysicalDrive1");
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let result = resolver.from_device_number(1);
    assert!(matches!(result, Err(TopologyError::AccessDenied(_))));
}

#[test]
fn test_enumerate_physical_disks() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disks = resolver.enumerate_physical_disks().unwrap();
    let numbers: Vec<u32> = disks.iter().map(|d| d.device_number()).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
    assert!(disks.iter().all(|d| d.storage_device_info().partition_number == 0));
    assert_eq!(system.device_scans(), 1);

    for disk in &disks {
        assert_eq!(disk, &resolver.from_device_number(disk.device_number()).unwrap().unwrap());
    }
}

#[test]
fn test_enumerate_skips_vanished_disks() {
    let system = workstation();
    system.make_unopenable(&system.device_path_of(1));
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let numbers: Vec<u32> = resolver
        .enumerate_physical_disks()
        .unwrap()
        .iter()
        .map(|d| d.device_number())
        .collect();
    assert_eq!(numbers, vec![0, 2]);
}

#[test]
fn test_options_override_privilege_and_classes() {
    let system = FakeSystem::new().with_disk(FakeDisk::new(0, "Fake NVMe 512", 512 * GB));
    let options = ResolverOptions::from_json(r#"{ "privilege": "standard", "device_classes": ["cd_rom"] }"#).unwrap();

    let resolver = DiskResolver::with_options(&system, &options, Privilege::Elevated);
    assert_eq!(resolver.privilege(), Privilege::Standard);

    // Only optical drives are searched for the descriptor.
    assert!(resolver.from_device_number(0).unwrap().is_none());

    let options = ResolverOptions {
        device_classes: vec![DeviceClass::Disk],
        ..options
    };
    let resolver = DiskResolver::with_options(&system, &options, Privilege::Elevated);
    let disk = resolver.from_device_number(0).unwrap().unwrap();
    assert_eq!(disk.total_size(), 512 * GB);
}

#[test]
fn test_concurrent_resolution() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let sizes: Vec<u64> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..3)
            .map(|number| {
                let resolver = &resolver;
                scope.spawn(move || resolver.from_device_number(number).unwrap().unwrap().total_size())
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(sizes, vec![512 * GB, 2048 * GB, 32 * GB]);
    assert_eq!(system.open_handles(), 0);
}

#[test]
fn test_serializes_to_json() {
    let system = workstation();
    let resolver = DiskResolver::new(&system, Privilege::Elevated);

    let disk = resolver.from_device_number(2).unwrap().unwrap();
    let json = serde_json::to_value(&disk).unwrap();
    assert_eq!(json["name"], "Fake USB Stick");
    assert_eq!(json["logical_drives"][0], "E:");
    assert_eq!(json["storage_adapter_info"]["bus_type"], "usb");
}
