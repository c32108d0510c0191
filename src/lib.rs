//! A flat, single-volume toy filesystem: a fixed inode table, a free-block
//! bitmap and files mapped onto direct block pointers, on top of a simulated
//! block device.

pub mod blockmap;
pub mod config;
pub mod consts;
pub mod device;
pub mod driver;
pub mod fs;
pub mod fuse;
pub mod inode;
mod inode_table;
mod io;
pub mod superblock;
pub mod util;

pub use config::Geometry;
pub use consts::{BlockPointer, Descriptor};
pub use device::{BlockDevice, Disk};
pub use fs::{FileInfo, FileSystem};
pub use inode::Inode;
pub use util::error::{DeviceError, FsError, Result};
