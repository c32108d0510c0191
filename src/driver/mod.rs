use std::io;

pub mod file_drive;
pub mod memory_drive;

pub use file_drive::FileDrive;
pub use memory_drive::MemoryDrive;

/// Sector-addressed storage. Sectors are the unit the hardware (or its
/// emulation) reads and writes; blocks are built on top of them by `IO`.
pub trait DeviceDriver {
    fn get_sector_count(&self) -> u64;
    fn get_sector_size(&self) -> usize;
    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>>;
    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()>;

    fn get_size(&self) -> u64 {
        self.get_sector_count() * self.get_sector_size() as u64
    }
}

pub(crate) fn check_sector<A: DeviceDriver + ?Sized>(drive: &A, index: u64, len: Option<usize>) -> io::Result<()> {
    if index >= drive.get_sector_count() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("sector {} out of range ({} sectors)", index, drive.get_sector_count()),
        ));
    }
    if let Some(len) = len {
        if len != drive.get_sector_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sector size mismatch - expected {}, got {}", drive.get_sector_size(), len),
            ));
        }
    }
    Ok(())
}
