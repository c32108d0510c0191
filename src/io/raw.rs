use std::io;

use crate::consts::BlockPointer;
use crate::driver::DeviceDriver;

pub(crate) fn raw_write_block<A: DeviceDriver>(drive: &mut A, block_size: usize, data: &[u8], index: BlockPointer) -> io::Result<()> {
    let sector_size = drive.get_sector_size();
    if block_size == sector_size {
        return drive.write_sector(index, data);
    }

    let ratio = (block_size / sector_size) as u64;
    let start = index * ratio;
    for (i, sector) in data.chunks(sector_size).enumerate() {
        tracing::trace!(sector = start + i as u64, "writing sector");
        drive.write_sector(start + i as u64, sector)?;
    }
    Ok(())
}

pub(crate) fn raw_read_block<A: DeviceDriver>(drive: &A, block_size: usize, index: BlockPointer) -> io::Result<Vec<u8>> {
    let sector_size = drive.get_sector_size();
    if block_size == sector_size {
        return drive.read_sector(index);
    }

    let ratio = (block_size / sector_size) as u64;
    let start = index * ratio;
    let mut buffer = Vec::with_capacity(block_size);
    for i in start..start + ratio {
        tracing::trace!(sector = i, "reading sector");
        buffer.append(&mut drive.read_sector(i)?);
    }
    Ok(buffer)
}
