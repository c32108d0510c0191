use crate::consts::{
    BlockPointer, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_INODE_COUNT, DIRECT_POINTERS,
};
use crate::inode::Inode;
use crate::superblock::SuperBlock;
use crate::util::bitmap::Bitmap;
use crate::util::error::DeviceError;
use crate::util::serializable::KnownSize;

/// Construction-time parameters of a volume. Persisted in the superblock, so
/// only `format` needs to be told about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub inode_count: usize,
    pub block_count: u64,
    pub block_size: usize,
}

impl Default for Geometry {
    fn default() -> Geometry {
        Geometry {
            inode_count: DEFAULT_INODE_COUNT,
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Geometry {
    pub fn new(inode_count: usize, block_count: u64, block_size: usize) -> Geometry {
        Geometry { inode_count, block_count, block_size }
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.inode_count == 0 {
            return Err(DeviceError::Geometry("inode count must be positive".to_string()));
        }
        if self.block_count == 0 {
            return Err(DeviceError::Geometry("block count must be positive".to_string()));
        }
        if self.block_count >= BlockPointer::MAX {
            return Err(DeviceError::Geometry(format!("block count {} too large", self.block_count)));
        }
        let min = Inode::size_on_disk().max(SuperBlock::size_on_disk());
        if self.block_size < min {
            return Err(DeviceError::Geometry(format!(
                "block size {} is smaller than the minimum of {} bytes",
                self.block_size, min
            )));
        }
        Ok(())
    }

    pub fn bitmap_bytes(&self) -> usize {
        Bitmap::byte_len(self.block_count as usize)
    }

    pub fn bitmap_blocks(&self) -> u64 {
        self.bitmap_bytes().div_ceil(self.block_size) as u64
    }

    pub fn inodes_per_block(&self) -> usize {
        self.block_size / Inode::size_on_disk()
    }

    pub fn inode_table_blocks(&self) -> u64 {
        self.inode_count.div_ceil(self.inodes_per_block()) as u64
    }

    /// First device block of the bitmap region; block 0 holds the superblock.
    pub fn bitmap_start(&self) -> u64 {
        1
    }

    pub fn inode_table_start(&self) -> u64 {
        self.bitmap_start() + self.bitmap_blocks()
    }

    pub fn data_start(&self) -> u64 {
        self.inode_table_start() + self.inode_table_blocks()
    }

    /// Device blocks needed for metadata plus data.
    pub fn total_blocks(&self) -> u64 {
        self.data_start() + self.block_count
    }

    pub fn device_bytes(&self) -> u64 {
        self.total_blocks() * self.block_size as u64
    }

    pub fn max_file_size(&self) -> usize {
        DIRECT_POINTERS * self.block_size
    }
}
