use crate::config::Geometry;
use crate::consts::{BlockPointer, Descriptor, DEFAULT_SECTOR_SIZE};
use crate::driver::{DeviceDriver, MemoryDrive};
use crate::inode::Inode;
use crate::inode_table::InodeTable;
use crate::io::IO;
use crate::superblock::SuperBlock;
use crate::util::error::DeviceError;

/// The storage contract the filesystem is written against. Indices are
/// checked by the implementation; data blocks are addressed `0..block_count`
/// regardless of where they physically live.
pub trait BlockDevice {
    fn geometry(&self) -> Geometry;

    /// Resets the device to unused inode slots and an all-free bitmap.
    fn format(&mut self) -> Result<(), DeviceError>;

    fn read_inode(&self, slot: Descriptor) -> Result<Inode, DeviceError>;
    fn write_inode(&mut self, inode: &Inode, slot: Descriptor) -> Result<(), DeviceError>;

    fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>, DeviceError>;
    fn write_block(&mut self, data: &[u8], index: BlockPointer) -> Result<(), DeviceError>;

    /// The packed bitmap, `ceil(block_count / 8)` bytes.
    fn read_bitmap(&self) -> Result<Vec<u8>, DeviceError>;
    fn write_bitmap(&mut self, bitmap: &[u8]) -> Result<(), DeviceError>;
}

/// `BlockDevice` laid out on a sector driver:
/// superblock | bitmap blocks | inode table blocks | data blocks.
pub struct Disk<A: DeviceDriver> {
    io: IO<A>,
    superblock: SuperBlock,
    inode_table: InodeTable,
}

impl<A: DeviceDriver> Disk<A> {
    /// Wraps a driver for the given geometry. Nothing is written until
    /// `format` is called.
    pub fn new(drive: A, geometry: Geometry) -> Result<Disk<A>, DeviceError> {
        geometry.validate()?;
        let io = IO::new(drive, geometry.block_size)?;
        Disk::assemble(io, SuperBlock::new(geometry))
    }

    /// Attaches to a driver that already carries a formatted volume.
    pub fn open(drive: A) -> Result<Disk<A>, DeviceError> {
        let superblock = SuperBlock::read(&drive)?;
        let io = IO::new(drive, superblock.geometry.block_size)?;
        tracing::info!(geometry = ?superblock.geometry, "opened volume");
        Disk::assemble(io, superblock)
    }

    fn assemble(io: IO<A>, superblock: SuperBlock) -> Result<Disk<A>, DeviceError> {
        let geometry = superblock.geometry;
        if io.block_count < geometry.total_blocks() {
            return Err(DeviceError::Geometry(format!(
                "device holds {} blocks of {} bytes, volume needs {}",
                io.block_count,
                geometry.block_size,
                geometry.total_blocks()
            )));
        }
        let inode_table = InodeTable::new(&geometry);
        Ok(Disk { io, superblock, inode_table })
    }

    pub fn into_driver(self) -> A {
        self.io.device
    }

    fn check_block(&self, index: BlockPointer) -> Result<BlockPointer, DeviceError> {
        let geometry = self.superblock.geometry;
        if index >= geometry.block_count {
            return Err(DeviceError::OutOfRange { what: "data block", index, limit: geometry.block_count });
        }
        Ok(geometry.data_start() + index)
    }
}

impl Disk<MemoryDrive> {
    /// A RAM-backed disk sized exactly for `geometry`.
    pub fn memory(geometry: Geometry) -> Result<Disk<MemoryDrive>, DeviceError> {
        geometry.validate()?;
        let sector_size = if geometry.block_size % DEFAULT_SECTOR_SIZE == 0 {
            DEFAULT_SECTOR_SIZE
        } else {
            geometry.block_size
        };
        Disk::new(MemoryDrive::new(geometry.device_bytes(), sector_size), geometry)
    }
}

impl<A: DeviceDriver> BlockDevice for Disk<A> {
    fn geometry(&self) -> Geometry {
        self.superblock.geometry
    }

    fn format(&mut self) -> Result<(), DeviceError> {
        let geometry = self.superblock.geometry;
        tracing::info!(
            inodes = geometry.inode_count,
            blocks = geometry.block_count,
            block_size = geometry.block_size,
            "formatting volume"
        );
        self.superblock.write(&mut self.io)?;
        self.write_bitmap(&vec![0; geometry.bitmap_bytes()])?;
        self.inode_table.create(&mut self.io)
    }

    fn read_inode(&self, slot: Descriptor) -> Result<Inode, DeviceError> {
        self.inode_table.read_inode(&self.io, slot)
    }

    fn write_inode(&mut self, inode: &Inode, slot: Descriptor) -> Result<(), DeviceError> {
        self.inode_table.write_inode(&mut self.io, slot, inode)
    }

    fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>, DeviceError> {
        let physical = self.check_block(index)?;
        self.io.read_block(physical)
    }

    fn write_block(&mut self, data: &[u8], index: BlockPointer) -> Result<(), DeviceError> {
        let physical = self.check_block(index)?;
        self.io.write_block(physical, data)
    }

    fn read_bitmap(&self) -> Result<Vec<u8>, DeviceError> {
        let geometry = self.superblock.geometry;
        let mut data = Vec::with_capacity(geometry.bitmap_blocks() as usize * geometry.block_size);
        for i in 0..geometry.bitmap_blocks() {
            data.append(&mut self.io.read_block(geometry.bitmap_start() + i)?);
        }
        data.truncate(geometry.bitmap_bytes());
        Ok(data)
    }

    fn write_bitmap(&mut self, bitmap: &[u8]) -> Result<(), DeviceError> {
        let geometry = self.superblock.geometry;
        if bitmap.len() != geometry.bitmap_bytes() {
            return Err(DeviceError::BadLength { expected: geometry.bitmap_bytes(), actual: bitmap.len() });
        }
        for (i, chunk) in bitmap.chunks(geometry.block_size).enumerate() {
            let mut block = chunk.to_vec();
            block.resize(geometry.block_size, 0);
            self.io.write_block(geometry.bitmap_start() + i as u64, &block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockDevice, Disk};
    use crate::config::Geometry;
    use crate::driver::MemoryDrive;
    use crate::inode::Inode;
    use crate::util::error::DeviceError;

    fn formatted(geometry: Geometry) -> Disk<MemoryDrive> {
        let mut disk = Disk::memory(geometry).unwrap();
        disk.format().unwrap();
        disk
    }

    #[test]
    fn format_clears_everything() {
        let disk = formatted(Geometry::default());
        assert_eq!(disk.read_bitmap().unwrap(), vec![0; 32]);
        for slot in 0..64 {
            assert_eq!(disk.read_inode(slot).unwrap(), Inode::empty());
        }
    }

    #[test]
    fn data_blocks_are_independent_of_metadata() {
        let mut disk = formatted(Geometry::default());
        disk.write_block(&vec![0xab; 512], 0).unwrap();
        disk.write_block(&vec![0xcd; 512], 255).unwrap();
        disk.write_bitmap(&[0xff; 32]).unwrap();

        assert_eq!(disk.read_block(0).unwrap(), vec![0xab; 512]);
        assert_eq!(disk.read_block(255).unwrap(), vec![0xcd; 512]);
        assert_eq!(disk.read_bitmap().unwrap(), vec![0xff; 32]);
        assert_eq!(disk.read_inode(0).unwrap(), Inode::empty());
    }

    #[test]
    fn rejects_out_of_range_access() {
        let mut disk = formatted(Geometry::default());
        assert!(matches!(disk.read_block(256), Err(DeviceError::OutOfRange { .. })));
        assert!(matches!(disk.write_block(&[0; 512], 256), Err(DeviceError::OutOfRange { .. })));
        assert!(matches!(disk.write_block(&[0; 100], 0), Err(DeviceError::BadLength { .. })));
        assert!(matches!(disk.read_inode(64), Err(DeviceError::OutOfRange { .. })));
        assert!(matches!(disk.write_bitmap(&[0; 3]), Err(DeviceError::BadLength { .. })));
    }

    #[test]
    fn reopen_restores_geometry() {
        let geometry = Geometry::new(8, 40, 1024);
        let mut disk = formatted(geometry);
        disk.write_inode(&Inode::new("kept"), 5).unwrap();

        let disk = Disk::open(disk.into_driver()).unwrap();
        assert_eq!(disk.geometry(), geometry);
        assert_eq!(disk.read_inode(5).unwrap().name.as_deref(), Some("kept"));
    }

    #[test]
    fn too_small_drive() {
        let drive = MemoryDrive::new(10 * 512, 512);
        assert!(matches!(Disk::new(drive, Geometry::default()), Err(DeviceError::Geometry(_))));
        assert!(matches!(Disk::open(MemoryDrive::new(10 * 512, 512)), Err(DeviceError::NotFormatted)));
    }
}
