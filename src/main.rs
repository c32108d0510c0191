use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use fuser::MountOption;
use tracing_subscriber::EnvFilter;

use flatfs::consts::{DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_INODE_COUNT, DEFAULT_SECTOR_SIZE};
use flatfs::driver::FileDrive;
use flatfs::fuse::FlatFuse;
use flatfs::util::format::pretty_size_from_bytes;
use flatfs::{Disk, FileSystem, Geometry};

#[derive(Parser)]
#[command(name = "flatfs", version, about = "Flat single-volume filesystem on an image file")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and format a new image file
    Format {
        image: PathBuf,
        #[arg(long, default_value_t = DEFAULT_INODE_COUNT)]
        inodes: usize,
        #[arg(long, default_value_t = DEFAULT_BLOCK_COUNT)]
        blocks: u64,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },
    /// Print geometry, usage and files of an image
    Info { image: PathBuf },
    /// Mount an image through FUSE
    Mount { image: PathBuf, mountpoint: PathBuf },
}

fn open_image(image: &Path) -> Result<FileSystem<Disk<FileDrive>>> {
    let drive = FileDrive::open(image, DEFAULT_SECTOR_SIZE)
        .with_context(|| format!("unable to open {}", image.display()))?;
    let disk = Disk::open(drive).context("unable to read volume")?;
    Ok(FileSystem::mount(disk)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match Cli::parse().command {
        Command::Format { image, inodes, blocks, block_size } => {
            ensure!(
                block_size % DEFAULT_SECTOR_SIZE == 0,
                "block size must be a multiple of {} bytes",
                DEFAULT_SECTOR_SIZE
            );
            let geometry = Geometry::new(inodes, blocks, block_size);
            geometry.validate()?;
            let drive = FileDrive::new(&image, geometry.device_bytes(), DEFAULT_SECTOR_SIZE)
                .with_context(|| format!("unable to create {}", image.display()))?;
            let fs = FileSystem::format(Disk::new(drive, geometry)?)?;
            println!(
                "formatted {}: {} inodes, {} blocks of {} ({} per file)",
                image.display(),
                inodes,
                blocks,
                pretty_size_from_bytes(block_size as u64),
                pretty_size_from_bytes(fs.max_file_size() as u64)
            );
        }
        Command::Info { image } => {
            let fs = open_image(&image)?;
            let geometry = fs.geometry();
            println!("inodes:     {}", geometry.inode_count);
            println!("blocks:     {} x {}", geometry.block_count, pretty_size_from_bytes(geometry.block_size as u64));
            println!(
                "free:       {} blocks ({})",
                fs.free_blocks(),
                pretty_size_from_bytes((fs.free_blocks() * geometry.block_size) as u64)
            );
            println!("max file:   {}", pretty_size_from_bytes(fs.max_file_size() as u64));
            for file in fs.list()? {
                println!("{:>4}  {:>10}  {}", file.descriptor, pretty_size_from_bytes(file.size), file.name);
            }
            fs.check()?;
        }
        Command::Mount { image, mountpoint } => {
            let fs = open_image(&image)?;
            let owner = std::fs::metadata(&mountpoint)
                .with_context(|| format!("unable to stat {}", mountpoint.display()))?;
            let options = [MountOption::FSName("flatfs".to_string()), MountOption::DefaultPermissions];
            tracing::info!(image = %image.display(), mountpoint = %mountpoint.display(), "mounting");
            fuser::mount2(FlatFuse::new(fs, owner.uid(), owner.gid()), &mountpoint, &options)?;
        }
    }
    Ok(())
}
