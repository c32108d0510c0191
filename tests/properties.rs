use std::collections::HashSet;

use flatfs::driver::MemoryDrive;
use flatfs::{BlockDevice, Disk, FileSystem, FsError, Geometry};
use proptest::prelude::*;

const BLOCK_SIZE: usize = 512;

fn new_fs(block_count: u64) -> FileSystem<Disk<MemoryDrive>> {
    FileSystem::format(Disk::memory(Geometry::new(8, block_count, BLOCK_SIZE)).unwrap()).unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    Write(u8, usize),
    Delete(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Create),
        (0u8..6, 0usize..9000).prop_map(|(file, len)| Op::Write(file, len)),
        (0u8..6).prop_map(Op::Delete),
    ]
}

/// Bits set in the bitmap, and every non-sentinel pointer of every used slot.
fn usage<D: BlockDevice>(device: &D) -> (usize, Vec<u64>) {
    let geometry = device.geometry();
    let bits = device
        .read_bitmap()
        .unwrap()
        .iter()
        .map(|byte| byte.count_ones() as usize)
        .sum::<usize>();
    let mut pointers = Vec::new();
    for slot in 0..geometry.inode_count {
        let inode = device.read_inode(slot).unwrap();
        if inode.is_used() {
            pointers.extend(inode.blocks());
        }
    }
    (bits, pointers)
}

proptest! {
    #[test]
    fn write_then_read_round_trips(data in proptest::collection::vec(any::<u8>(), 0..=16 * BLOCK_SIZE)) {
        let mut fs = new_fs(256);
        let fd = fs.create("file").unwrap();
        fs.write(fd, &data).unwrap();
        prop_assert_eq!(fs.read(fd).unwrap(), data.clone());
        prop_assert_eq!(fs.stat("file").unwrap().size, data.len() as u64);
        prop_assert_eq!(fs.stat("file").unwrap().blocks, data.len().div_ceil(BLOCK_SIZE));
    }

    #[test]
    fn oversize_writes_are_rejected(extra in 1usize..2000, old in 0usize..3000) {
        let mut fs = new_fs(256);
        let fd = fs.create("file").unwrap();
        fs.write(fd, &vec![1; old]).unwrap();
        let max = fs.max_file_size();
        let result = fs.write(fd, &vec![2; max + extra]);
        prop_assert!(matches!(result, Err(FsError::FileTooLarge { .. })), "expected FileTooLarge, got {:?}", result);
        prop_assert_eq!(fs.free_blocks(), 256);
        prop_assert!(fs.read(fd).unwrap().is_empty());
    }

    #[test]
    fn bitmap_matches_inodes(ops in proptest::collection::vec(op(), 1..40)) {
        let mut fs = new_fs(48);
        for op in ops {
            match op {
                Op::Create(file) => {
                    let _ = fs.create(&format!("f{}", file));
                }
                Op::Write(file, len) => {
                    if let Ok(fd) = fs.open(&format!("f{}", file)) {
                        let _ = fs.write(fd, &vec![file; len]);
                    }
                }
                Op::Delete(file) => fs.delete(&format!("f{}", file)).unwrap(),
            }
        }

        let device = fs.into_device();
        let (bits, pointers) = usage(&device);
        prop_assert_eq!(bits, pointers.len());
        let distinct: HashSet<u64> = pointers.iter().copied().collect();
        prop_assert_eq!(distinct.len(), pointers.len());

        let fs = FileSystem::mount(device).unwrap();
        prop_assert!(fs.check().is_ok());
    }
}
