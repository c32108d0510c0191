use crate::consts::BlockPointer;
use crate::driver::DeviceDriver;
use crate::util::error::DeviceError;
use raw::{raw_read_block, raw_write_block};

mod raw;

/// Block-granular access to a sector-granular driver. A block spans
/// `block_size / sector_size` consecutive sectors.
pub(crate) struct IO<A: DeviceDriver> {
    pub(crate) device: A,
    pub block_size: usize,
    pub block_count: u64,
}

impl<A: DeviceDriver> IO<A> {
    pub fn new(device: A, block_size: usize) -> Result<IO<A>, DeviceError> {
        let sector_size = device.get_sector_size();
        if sector_size == 0 || block_size < sector_size {
            return Err(DeviceError::Geometry(format!(
                "block size {} must be greater than or equal to sector size {}",
                block_size, sector_size
            )));
        }
        if block_size % sector_size != 0 {
            return Err(DeviceError::Geometry(format!(
                "block size {} must be a multiple of sector size {}",
                block_size, sector_size
            )));
        }

        let block_count = device.get_size() / block_size as u64;
        Ok(IO { device, block_size, block_count })
    }

    pub(crate) fn write_block(&mut self, index: BlockPointer, block: &[u8]) -> Result<(), DeviceError> {
        if block.len() != self.block_size {
            return Err(DeviceError::BadLength { expected: self.block_size, actual: block.len() });
        }
        self.check_index(index)?;
        Ok(raw_write_block(&mut self.device, self.block_size, block, index)?)
    }

    pub(crate) fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>, DeviceError> {
        self.check_index(index)?;
        Ok(raw_read_block(&self.device, self.block_size, index)?)
    }

    fn check_index(&self, index: BlockPointer) -> Result<(), DeviceError> {
        if index >= self.block_count {
            return Err(DeviceError::OutOfRange { what: "device block", index, limit: self.block_count });
        }
        Ok(())
    }
}
