use std::io;

use crate::driver::{check_sector, DeviceDriver};

/// A drive backed by a byte vector. Contents live as long as the value does.
#[derive(Debug, Clone)]
pub struct MemoryDrive {
    data: Vec<u8>,
    sector_size: usize,
}

impl MemoryDrive {
    /// `bytes` is rounded up to a whole number of sectors.
    pub fn new(bytes: u64, sector_size: usize) -> MemoryDrive {
        let sectors = (bytes as usize).div_ceil(sector_size.max(1));
        MemoryDrive { data: vec![0; sectors * sector_size], sector_size }
    }
}

impl DeviceDriver for MemoryDrive {
    fn get_sector_count(&self) -> u64 {
        if self.sector_size == 0 {
            return 0;
        }
        (self.data.len() / self.sector_size) as u64
    }

    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
        check_sector(self, index, None)?;
        let offset = index as usize * self.sector_size;
        Ok(self.data[offset..offset + self.sector_size].to_vec())
    }

    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
        check_sector(self, index, Some(data.len()))?;
        let offset = index as usize * self.sector_size;
        self.data[offset..offset + self.sector_size].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryDrive;
    use crate::driver::DeviceDriver;

    #[test]
    fn read_write() {
        let mut drive = MemoryDrive::new(1024 * 512, 512);
        assert_eq!(drive.get_sector_count(), 1024);
        assert_eq!(drive.get_size(), 1024 * 512);

        let sector0 = vec![0x42; 512];
        let sector1023 = vec![0x52; 512];
        drive.write_sector(0, &sector0).unwrap();
        drive.write_sector(1023, &sector1023).unwrap();

        assert_eq!(drive.read_sector(0).unwrap(), sector0);
        assert_eq!(drive.read_sector(1023).unwrap(), sector1023);
        assert_eq!(drive.read_sector(1).unwrap(), vec![0; 512]);
    }

    #[test]
    fn rejects_bad_access() {
        let mut drive = MemoryDrive::new(4 * 512, 512);
        assert!(drive.read_sector(4).is_err());
        assert!(drive.write_sector(0, &[1, 2, 3]).is_err());
    }
}
