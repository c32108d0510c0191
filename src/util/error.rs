use std::os::raw::c_int;

use thiserror::Error;

use crate::consts::Descriptor;

type ErrorNum = c_int;

/// Failures of the layers below the filesystem: drivers, block IO and the
/// on-device layout.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{what} index {index} out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: u64,
        limit: u64,
    },

    #[error("buffer size mismatch - expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("no superblock found")]
    NotFormatted,

    #[error("corrupted record: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("inode table is full")]
    TableFull,

    #[error("{0} not found")]
    NotFound(String),

    #[error("file descriptor {given} does not match file descriptor of open file ({open:?})")]
    DescriptorMismatch {
        given: Descriptor,
        open: Option<Descriptor>,
    },

    #[error("invalid file descriptor {0}")]
    InvalidDescriptor(Descriptor),

    #[error("not enough free blocks: requested {requested}, available {available}")]
    InsufficientSpace { requested: usize, available: usize },

    #[error("file cannot be larger than {max} bytes (got {size})")]
    FileTooLarge { size: usize, max: usize },

    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("filesystem inconsistent: {0}")]
    Inconsistent(String),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl FsError {
    /// The errno reported to the kernel when this error ends a FUSE request.
    pub fn errno(&self) -> ErrorNum {
        match self {
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::TableFull => libc::ENOSPC,
            FsError::NotFound(_) => libc::ENOENT,
            FsError::DescriptorMismatch { .. } | FsError::InvalidDescriptor(_) => libc::EBADF,
            FsError::InsufficientSpace { .. } => libc::ENOSPC,
            FsError::FileTooLarge { .. } => libc::EFBIG,
            FsError::InvalidName(name) if name.trim().len() > crate::consts::FILE_NAME_LENGTH => {
                libc::ENAMETOOLONG
            }
            FsError::InvalidName(_) => libc::EINVAL,
            FsError::Inconsistent(_) | FsError::Device(_) => libc::EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(FsError::NotFound("a".into()).errno(), libc::ENOENT);
        assert_eq!(FsError::AlreadyExists("a".into()).errno(), libc::EEXIST);
        assert_eq!(FsError::FileTooLarge { size: 10, max: 5 }.errno(), libc::EFBIG);
        assert_eq!(FsError::InvalidName("".into()).errno(), libc::EINVAL);
        assert_eq!(FsError::InvalidName("x".repeat(40)).errno(), libc::ENAMETOOLONG);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(FsError::from(DeviceError::from(io)).errno(), libc::EIO);
    }

    #[test]
    fn messages_carry_context() {
        let err = FsError::DescriptorMismatch { given: 3, open: Some(1) };
        assert!(err.to_string().contains("file descriptor 3"));
        let err = FsError::InsufficientSpace { requested: 4, available: 2 };
        assert_eq!(err.to_string(), "not enough free blocks: requested 4, available 2");
    }
}
