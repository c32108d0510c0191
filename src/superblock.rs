use crate::config::Geometry;
use crate::consts::{DIRECT_POINTERS, FILE_NAME_LENGTH};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::util::error::DeviceError;
use crate::util::serializable::{ensure_length, read_u32, read_u64, ByteSerializable, KnownSize};

const MAGIC: u32 = 0xf1a7_f500;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SuperBlock {
    pub magic: u32,
    pub geometry: Geometry,
    pub direct_pointers: u32,
    pub name_length: u32,
}

impl SuperBlock {
    pub fn new(geometry: Geometry) -> SuperBlock {
        SuperBlock {
            magic: MAGIC,
            geometry,
            direct_pointers: DIRECT_POINTERS as u32,
            name_length: FILE_NAME_LENGTH as u32,
        }
    }

    // note: we can't use block reading since we don't know the block size yet
    pub(crate) fn read<A: DeviceDriver>(drive: &A) -> Result<SuperBlock, DeviceError> {
        if drive.get_sector_count() == 0 {
            return Err(DeviceError::NotFormatted);
        }
        let buffer = drive.read_sector(0)?;
        ensure_length(&buffer, SuperBlock::size_on_disk())?;
        if read_u32(&buffer, 0) != MAGIC {
            return Err(DeviceError::NotFormatted);
        }

        let superblock = SuperBlock::from_bytes(&buffer)?;
        if superblock.direct_pointers as usize != DIRECT_POINTERS
            || superblock.name_length as usize != FILE_NAME_LENGTH
        {
            return Err(DeviceError::Corrupt(format!(
                "inode layout mismatch: {} pointers / {} name bytes",
                superblock.direct_pointers, superblock.name_length
            )));
        }
        superblock.geometry.validate()?;
        Ok(superblock)
    }

    pub(crate) fn write<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<(), DeviceError> {
        let mut buffer = self.to_bytes();
        buffer.resize(io.block_size, 0);
        io.write_block(0, &buffer)
    }
}

impl KnownSize for SuperBlock {
    fn size_on_disk() -> usize {
        32
    }
}

impl ByteSerializable for SuperBlock {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(SuperBlock::size_on_disk());
        buffer.extend_from_slice(&self.magic.to_le_bytes());
        buffer.extend_from_slice(&(self.geometry.block_size as u32).to_le_bytes());
        buffer.extend_from_slice(&self.geometry.block_count.to_le_bytes());
        buffer.extend_from_slice(&(self.geometry.inode_count as u64).to_le_bytes());
        buffer.extend_from_slice(&self.direct_pointers.to_le_bytes());
        buffer.extend_from_slice(&self.name_length.to_le_bytes());
        buffer
    }

    fn from_bytes(bytes: &[u8]) -> Result<SuperBlock, DeviceError> {
        ensure_length(bytes, SuperBlock::size_on_disk())?;
        let geometry = Geometry {
            block_size: read_u32(bytes, 4) as usize,
            block_count: read_u64(bytes, 8),
            inode_count: read_u64(bytes, 16) as usize,
        };
        Ok(SuperBlock {
            magic: read_u32(bytes, 0),
            geometry,
            direct_pointers: read_u32(bytes, 24),
            name_length: read_u32(bytes, 28),
        })
    }
}
