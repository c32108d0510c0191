use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};

use crate::consts::Descriptor;
use crate::device::BlockDevice;
use crate::fs::{FileInfo, FileSystem};
use crate::util::error::{FsError, Result};

pub const ROOT_INODE: u64 = 1;
const FIRST_FILE_INODE: u64 = 2;
const TTL: Duration = Duration::from_secs(1);

/// Exposes a `FileSystem` as a single directory. File `ino` is the slot
/// number plus two; every request opens, uses and closes the one session.
pub struct FlatFuse<D: BlockDevice> {
    fs: FileSystem<D>,
    uid: u32,
    gid: u32,
    mounted_at: SystemTime,
}

impl<D: BlockDevice> FlatFuse<D> {
    pub fn new(fs: FileSystem<D>, uid: u32, gid: u32) -> FlatFuse<D> {
        FlatFuse { fs, uid, gid, mounted_at: SystemTime::now() }
    }

    pub fn into_inner(self) -> FileSystem<D> {
        self.fs
    }

    fn descriptor(ino: u64) -> Option<Descriptor> {
        ino.checked_sub(FIRST_FILE_INODE).map(|d| d as Descriptor)
    }

    fn inode_number(descriptor: Descriptor) -> u64 {
        descriptor as u64 + FIRST_FILE_INODE
    }

    fn entry(&self, ino: u64) -> Result<FileInfo> {
        Self::descriptor(ino)
            .map(|descriptor| self.fs.entry(descriptor))
            .transpose()?
            .flatten()
            .ok_or_else(|| FsError::NotFound(format!("inode {}", ino)))
    }

    fn load(&mut self, name: &str) -> Result<Vec<u8>> {
        let fd = self.fs.open(name)?;
        let data = self.fs.read(fd);
        self.fs.close(fd)?;
        data
    }

    fn store(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let fd = self.fs.open(name)?;
        let written = self.fs.write(fd, data);
        self.fs.close(fd)?;
        written
    }

    pub(crate) fn read_range(&mut self, ino: u64, offset: u64, size: usize) -> Result<Vec<u8>> {
        let info = self.entry(ino)?;
        let data = self.load(&info.name)?;
        let start = (offset as usize).min(data.len());
        let end = start.saturating_add(size).min(data.len());
        Ok(data[start..end].to_vec())
    }

    /// Writes replace whole files, so a ranged write is read, patch, rewrite.
    pub(crate) fn write_at(&mut self, ino: u64, offset: u64, patch: &[u8]) -> Result<FileInfo> {
        let info = self.entry(ino)?;
        let offset = offset as usize;
        let end = offset.saturating_add(patch.len());
        self.check_size(end)?;
        self.check_space(&info, end)?;
        let mut data = self.load(&info.name)?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(patch);
        self.store(&info.name, &data)?;
        self.entry(ino)
    }

    pub(crate) fn truncate(&mut self, ino: u64, size: u64) -> Result<FileInfo> {
        let info = self.entry(ino)?;
        if info.size == size {
            return Ok(info);
        }
        self.check_size(size as usize)?;
        self.check_space(&info, size as usize)?;
        let mut data = self.load(&info.name)?;
        data.resize(size as usize, 0);
        self.store(&info.name, &data)?;
        self.entry(ino)
    }

    /// Rejects oversize content up front; the core would empty the file first.
    fn check_size(&self, size: usize) -> Result<()> {
        let max = self.fs.max_file_size();
        if size > max {
            return Err(FsError::FileTooLarge { size, max });
        }
        Ok(())
    }

    /// Same for a rewrite that cannot get its blocks; the file's own blocks
    /// count as available since the core frees them first.
    fn check_space(&self, info: &FileInfo, size: usize) -> Result<()> {
        let requested = size.div_ceil(self.fs.geometry().block_size);
        let available = info.blocks + self.fs.free_blocks();
        if requested > available {
            return Err(FsError::InsufficientSpace { requested, available });
        }
        Ok(())
    }

    pub(crate) fn create_file(&mut self, name: &str) -> Result<FileInfo> {
        let fd = self.fs.create(name)?;
        self.fs.close(fd)?;
        self.entry(Self::inode_number(fd))
    }

    pub(crate) fn remove_file(&mut self, name: &str) -> Result<()> {
        // delete is silent for unknown names; unlink must not be
        self.fs.stat(name)?;
        self.fs.delete(name)
    }

    pub(crate) fn directory_entries(&self) -> Result<Vec<(u64, FileType, String)>> {
        let mut entries = vec![
            (ROOT_INODE, FileType::Directory, ".".to_string()),
            (ROOT_INODE, FileType::Directory, "..".to_string()),
        ];
        for file in self.fs.list()? {
            entries.push((Self::inode_number(file.descriptor), FileType::RegularFile, file.name));
        }
        Ok(entries)
    }

    fn file_attr(&self, info: &FileInfo) -> FileAttr {
        let block_size = self.fs.geometry().block_size;
        FileAttr {
            ino: Self::inode_number(info.descriptor),
            size: info.size,
            blocks: (info.blocks * block_size / 512) as u64,
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind: FileType::RegularFile,
            perm: 0o644,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            flags: 0,
            blksize: block_size as u32,
        }
    }

    fn root_attr(&self) -> FileAttr {
        FileAttr {
            ino: ROOT_INODE,
            size: 0,
            blocks: 0,
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            flags: 0,
            blksize: self.fs.geometry().block_size as u32,
        }
    }
}

fn file_name(name: &OsStr) -> Result<&str> {
    name.to_str().ok_or_else(|| FsError::InvalidName(name.to_string_lossy().into_owned()))
}

fn log_failure(op: &str, err: &FsError) -> libc::c_int {
    match err {
        FsError::NotFound(_) => tracing::debug!(op, %err, "request failed"),
        _ => tracing::warn!(op, %err, "request failed"),
    }
    err.errno()
}

impl<D: BlockDevice> Filesystem for FlatFuse<D> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        match file_name(name).and_then(|name| self.fs.stat(name)) {
            Ok(info) => reply.entry(&TTL, &self.file_attr(&info), 0),
            Err(e) => reply.error(log_failure("lookup", &e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        if ino == ROOT_INODE {
            reply.attr(&TTL, &self.root_attr());
            return;
        }
        match self.entry(ino) {
            Ok(info) => reply.attr(&TTL, &self.file_attr(&info)),
            Err(e) => reply.error(log_failure("getattr", &e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        if ino == ROOT_INODE {
            reply.attr(&TTL, &self.root_attr());
            return;
        }
        let result = match size {
            Some(size) => self.truncate(ino, size),
            None => self.entry(ino),
        };
        match result {
            Ok(info) => reply.attr(&TTL, &self.file_attr(&info)),
            Err(e) => reply.error(log_failure("setattr", &e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        match file_name(name).and_then(|name| self.remove_file(name)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(log_failure("unlink", &e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.entry(ino) {
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(log_failure("open", &e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.read_range(ino, offset as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(log_failure("read", &e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.write_at(ino, offset as u64, data) {
            Ok(_) => reply.written(data.len() as u32),
            Err(e) => reply.error(log_failure("write", &e)),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        if ino != ROOT_INODE {
            reply.error(libc::ENOTDIR);
            return;
        }
        let entries = match self.directory_entries() {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(log_failure("readdir", &e));
                return;
            }
        };
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        match file_name(name).and_then(|name| self.create_file(name)) {
            Ok(info) => reply.created(&TTL, &self.file_attr(&info), 0, 0, 0),
            Err(e) => reply.error(log_failure("create", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use fuser::FileType;

    use super::FlatFuse;
    use crate::config::Geometry;
    use crate::device::Disk;
    use crate::driver::MemoryDrive;
    use crate::fs::FileSystem;
    use crate::util::error::FsError;

    fn mount() -> FlatFuse<Disk<MemoryDrive>> {
        let fs = FileSystem::format(Disk::memory(Geometry::default()).unwrap()).unwrap();
        FlatFuse::new(fs, 1000, 1000)
    }

    #[test]
    fn create_write_read() {
        let mut fuse = mount();
        let info = fuse.create_file("a.txt").unwrap();
        assert_eq!(info.descriptor, 0);

        fuse.write_at(2, 0, b"hello world").unwrap();
        let info = fuse.write_at(2, 6, b"there").unwrap();
        assert_eq!(info.size, 11);
        assert_eq!(fuse.read_range(2, 0, 100).unwrap(), b"hello there");
        assert_eq!(fuse.read_range(2, 6, 3).unwrap(), b"the");
        assert!(fuse.read_range(2, 50, 3).unwrap().is_empty());
    }

    #[test]
    fn write_past_end_fills_gap() {
        let mut fuse = mount();
        fuse.create_file("gap").unwrap();
        fuse.write_at(2, 4, b"x").unwrap();
        assert_eq!(fuse.read_range(2, 0, 10).unwrap(), vec![0, 0, 0, 0, b'x']);
    }

    #[test]
    fn truncate_and_extend() {
        let mut fuse = mount();
        fuse.create_file("t").unwrap();
        fuse.write_at(2, 0, &[1; 1000]).unwrap();
        assert_eq!(fuse.truncate(2, 10).unwrap().blocks, 1);
        assert_eq!(fuse.truncate(2, 600).unwrap().size, 600);
        assert!(matches!(fuse.truncate(2, 1 << 20), Err(FsError::FileTooLarge { .. })));
        assert!(matches!(fuse.write_at(2, 8192, b"x"), Err(FsError::FileTooLarge { .. })));
        assert_eq!(fuse.read_range(2, 0, 1000).unwrap().len(), 600);
    }

    #[test]
    fn full_volume_keeps_content() {
        let fs = FileSystem::format(Disk::memory(Geometry::new(4, 4, 512)).unwrap()).unwrap();
        let mut fuse = FlatFuse::new(fs, 1000, 1000);
        fuse.create_file("a").unwrap();
        fuse.create_file("b").unwrap();
        fuse.write_at(2, 0, &[1; 1024]).unwrap();
        fuse.write_at(3, 0, &[2; 1024]).unwrap();

        match fuse.write_at(2, 1024, b"x") {
            Err(FsError::InsufficientSpace { requested, available }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(fuse.truncate(2, 1025), Err(FsError::InsufficientSpace { .. })));
        assert_eq!(fuse.read_range(2, 0, 4096).unwrap(), vec![1; 1024]);

        fuse.write_at(2, 1000, &[3; 24]).unwrap();
        assert_eq!(fuse.read_range(2, 1000, 100).unwrap(), vec![3; 24]);
        assert_eq!(fuse.into_inner().free_blocks(), 0);
    }

    #[test]
    fn listing_and_unlink() {
        let mut fuse = mount();
        fuse.create_file("a").unwrap();
        fuse.create_file("b").unwrap();
        let entries = fuse.directory_entries().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3], (3, FileType::RegularFile, "b".to_string()));

        fuse.remove_file("a").unwrap();
        assert!(matches!(fuse.remove_file("a"), Err(FsError::NotFound(_))));
        assert_eq!(fuse.into_inner().list().unwrap().len(), 1);
    }

    #[test]
    fn unknown_inodes() {
        let mut fuse = mount();
        assert!(matches!(fuse.read_range(0, 0, 1), Err(FsError::NotFound(_))));
        assert!(matches!(fuse.read_range(9, 0, 1), Err(FsError::NotFound(_))));
        assert_eq!(fuse.create_file("a").unwrap().descriptor, 0);
        assert!(matches!(fuse.create_file("a"), Err(FsError::AlreadyExists(_))));
    }
}
