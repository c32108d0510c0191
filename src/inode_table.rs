use crate::config::Geometry;
use crate::consts::{BlockPointer, Descriptor};
use crate::driver::DeviceDriver;
use crate::inode::Inode;
use crate::io::IO;
use crate::util::error::DeviceError;
use crate::util::serializable::{ByteSerializable, KnownSize};

/// Where the inode slots live on the device: `inodes_per_block` fixed-size
/// records packed into consecutive blocks starting at `table_index`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InodeTable {
    pub(crate) inode_count: usize,
    table_index: BlockPointer,
    inodes_per_block: usize,
    pub(crate) block_count: u64,
}

impl InodeTable {
    pub fn new(geometry: &Geometry) -> InodeTable {
        InodeTable {
            inode_count: geometry.inode_count,
            table_index: geometry.inode_table_start(),
            inodes_per_block: geometry.inodes_per_block(),
            block_count: geometry.inode_table_blocks(),
        }
    }

    /// Writes an unused record into every slot.
    pub fn create<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<(), DeviceError> {
        let record = Inode::empty().to_bytes();
        let mut block = vec![0u8; io.block_size];
        for i in 0..self.inodes_per_block {
            let offset = i * Inode::size_on_disk();
            block[offset..offset + record.len()].copy_from_slice(&record);
        }
        for i in 0..self.block_count {
            io.write_block(self.table_index + i, &block)?;
        }
        Ok(())
    }

    pub fn read_inode<A: DeviceDriver>(&self, io: &IO<A>, index: Descriptor) -> Result<Inode, DeviceError> {
        self.check_index(index)?;
        let block = io.read_block(self.inode_block(index))?;
        let offset = self.inode_offset(index);
        Inode::from_bytes(&block[offset..offset + Inode::size_on_disk()])
    }

    pub fn write_inode<A: DeviceDriver>(&self, io: &mut IO<A>, index: Descriptor, inode: &Inode) -> Result<(), DeviceError> {
        self.check_index(index)?;
        let inode_block = self.inode_block(index);
        let offset = self.inode_offset(index);

        let mut block = io.read_block(inode_block)?;
        block[offset..offset + Inode::size_on_disk()].copy_from_slice(&inode.to_bytes());
        io.write_block(inode_block, &block)
    }

    #[inline]
    fn inode_block(&self, index: Descriptor) -> BlockPointer {
        self.table_index + (index / self.inodes_per_block) as u64
    }

    #[inline]
    fn inode_offset(&self, index: Descriptor) -> usize {
        (index % self.inodes_per_block) * Inode::size_on_disk()
    }

    fn check_index(&self, index: Descriptor) -> Result<(), DeviceError> {
        if index >= self.inode_count {
            return Err(DeviceError::OutOfRange {
                what: "inode slot",
                index: index as u64,
                limit: self.inode_count as u64,
            });
        }
        Ok(())
    }
}
