use crate::consts::BlockPointer;
use crate::device::BlockDevice;
use crate::util::bitmap::Bitmap;
use crate::util::error::{FsError, Result};

/// Free-block allocator. Bit `i` set means data block `i` belongs to some
/// file. Every change is written back through the device before returning.
#[derive(Debug)]
pub struct BlockMap {
    bitmap: Bitmap,
}

impl BlockMap {
    pub fn read<D: BlockDevice>(device: &D) -> Result<BlockMap> {
        let block_count = device.geometry().block_count as usize;
        let bytes = device.read_bitmap()?;
        Ok(BlockMap { bitmap: Bitmap::from_bytes(&bytes, block_count) })
    }

    pub fn write<D: BlockDevice>(&self, device: &mut D) -> Result<()> {
        Ok(device.write_bitmap(self.bitmap.as_bytes())?)
    }

    /// Claims the `count` lowest free blocks, first fit. Either all of them
    /// are claimed and persisted, or none is.
    pub fn find_and_claim<D: BlockDevice>(&mut self, device: &mut D, count: usize) -> Result<Vec<BlockPointer>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let found: Vec<usize> = self.bitmap.iter_clear().take(count).collect();
        if found.len() < count {
            tracing::debug!(requested = count, available = found.len(), "allocation failed");
            return Err(FsError::InsufficientSpace { requested: count, available: found.len() });
        }

        for index in found.iter() {
            self.bitmap.set(*index);
        }
        if let Err(e) = self.write(device) {
            for index in found.iter() {
                self.bitmap.clear(*index);
            }
            return Err(e);
        }

        tracing::debug!(blocks = ?found, "claimed blocks");
        Ok(found.into_iter().map(|index| index as BlockPointer).collect())
    }

    /// Frees the given blocks. Already free or unknown indices are skipped.
    pub fn release<D: BlockDevice>(&mut self, device: &mut D, blocks: &[BlockPointer]) -> Result<()> {
        let mut changed = Vec::new();
        for block in blocks {
            let index = *block as usize;
            if index < self.bitmap.len() && self.bitmap.test(index) {
                self.bitmap.clear(index);
                changed.push(index);
            }
        }
        if changed.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.write(device) {
            for index in changed.iter() {
                self.bitmap.set(*index);
            }
            return Err(e);
        }

        tracing::debug!(blocks = ?changed, "released blocks");
        Ok(())
    }

    pub fn is_used(&self, block: BlockPointer) -> bool {
        self.bitmap.test(block as usize)
    }

    pub fn free_count(&self) -> usize {
        self.bitmap.count_clear()
    }
}
