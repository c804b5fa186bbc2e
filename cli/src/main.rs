use anyhow::Context;
use clap::{Parser, Subcommand};
use disktopo_core::{classify, DiskResolver, PhysicalDiskInfo, Privilege, ResolverOptions};
use disktopo_platform::{current_privilege, PlatformBackend};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "disktopo")]
#[command(about = "Maps physical disks to their partitions, volumes and drive letters", long_about = None)]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Resolve as a standard user even when elevated
    #[arg(long, global = true)]
    standard: bool,
    /// Resolver options file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every physical disk
    List,
    /// Show one disk
    Show {
        /// Device number, drive letter, volume name or device path
        device: String,
    },
    /// Classify a device identifier without touching the system
    Classify {
        /// Identifier to classify
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match &cli.command {
        Commands::Classify { path } => {
            let classified = classify(path)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&classified)?);
            } else {
                println!("{} -> {} ({})", path, classified.path(), classified.kind());
            }
        }
        Commands::List => {
            let backend = PlatformBackend::new();
            let resolver = build_resolver(&cli, &backend)?;
            let disks = resolver.enumerate_physical_disks()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&disks)?);
            } else if disks.is_empty() {
                println!("No disks found.");
            } else {
                println!("Physical disks:\n");
                for disk in &disks {
                    print_disk(disk);
                }
            }
        }
        Commands::Show { device } => {
            let backend = PlatformBackend::new();
            let resolver = build_resolver(&cli, &backend)?;
            let found = match device.trim().parse::<u32>() {
                Ok(number) => resolver.from_device_number(number)?,
                Err(_) => resolver.from_device_path(device)?,
            };
            let disk = found.ok_or_else(|| anyhow::anyhow!("No disk found for '{}'", device))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&disk)?);
            } else {
                print_disk(&disk);
            }
        }
    }

    Ok(())
}

fn build_resolver<'a>(cli: &Cli, backend: &'a PlatformBackend) -> anyhow::Result<DiskResolver<'a, PlatformBackend>> {
    let mut options = match &cli.config {
        Some(path) => ResolverOptions::from_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => ResolverOptions::default(),
    };
    if cli.standard {
        options.privilege = Some(Privilege::Standard);
    }

    let resolver = DiskResolver::with_options(backend, &options, current_privilege());
    log::debug!("Resolving with {:?} privileges", resolver.privilege());

    if !resolver.privilege().is_elevated() {
        eprintln!("Note: not elevated; disk sizes are taken from partition and volume queries.");
    }
    Ok(resolver)
}

fn print_disk(disk: &PhysicalDiskInfo) {
    println!("Disk {}: {}", disk.device_number(), disk);
    println!("  Path: {}", disk.device_path());
    if let Some(name) = disk.dos_device_name() {
        println!("  NT device: {}", name);
    }
    println!("  Size: {:.2} GB", disk.total_size() as f64 / 1_073_741_824.0);
    if let Some(adapter) = disk.storage_adapter_info() {
        println!("  Bus: {:?}", adapter.bus_type);
    }
    if let Some(partitions) = disk.storage_partition_info() {
        println!(
            "  Layout: {:?}, {} partition(s)",
            partitions.partition_style, partitions.partition_count
        );
    }
    for (index, volume) in disk.partition_indexes().iter().zip(disk.volume_guids()) {
        println!("  Partition {}: {}", index, volume);
    }
    if !disk.logical_drives().is_empty() {
        println!("  Drives: {}", disk.logical_drives().join(", "));
    }
    println!();
}
