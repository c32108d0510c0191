pub const DIRECT_POINTERS: usize = 16;
pub const FILE_NAME_LENGTH: usize = 32;

pub const DEFAULT_INODE_COUNT: usize = 64;
pub const DEFAULT_BLOCK_COUNT: u64 = 256;
pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_SECTOR_SIZE: usize = 512;

/// Index of a data block, `0..block_count`.
pub type BlockPointer = u64;
/// Index of an inode slot, handed out by `create`/`open`.
pub type Descriptor = usize;
pub type DirectPointers = [Option<BlockPointer>; DIRECT_POINTERS];

pub(crate) const EMPTY_POINTERS: DirectPointers = [None; DIRECT_POINTERS];
pub(crate) const NULL_POINTER: BlockPointer = BlockPointer::MAX;
