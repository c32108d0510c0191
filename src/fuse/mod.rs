mod filesystem;

pub use filesystem::{FlatFuse, ROOT_INODE};
