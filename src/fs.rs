use crate::blockmap::BlockMap;
use crate::config::Geometry;
use crate::consts::{BlockPointer, Descriptor, FILE_NAME_LENGTH};
use crate::device::BlockDevice;
use crate::inode::Inode;
use crate::util::error::{DeviceError, FsError, Result};

/// The file currently open: its slot and a copy of its inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub descriptor: Descriptor,
    pub inode: Inode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub descriptor: Descriptor,
    pub name: String,
    pub size: u64,
    pub blocks: usize,
}

impl FileInfo {
    fn from_inode(descriptor: Descriptor, inode: &Inode) -> Option<FileInfo> {
        inode.name.as_ref().map(|name| FileInfo {
            descriptor,
            name: name.clone(),
            size: inode.size,
            blocks: inode.used_pointers(),
        })
    }
}

/// A flat, single-volume filesystem over a `BlockDevice`.
///
/// At most one file is open at a time. `create` and `open` replace whatever
/// session was active; `read` and `write` only accept the descriptor of the
/// open file.
pub struct FileSystem<D: BlockDevice> {
    device: D,
    blockmap: BlockMap,
    session: Option<Session>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats `device` and returns an empty filesystem on it.
    pub fn format(mut device: D) -> Result<FileSystem<D>> {
        device.format()?;
        FileSystem::mount(device)
    }

    /// Loads a filesystem from an already formatted device.
    pub fn mount(device: D) -> Result<FileSystem<D>> {
        let blockmap = BlockMap::read(&device)?;
        tracing::info!(free_blocks = blockmap.free_count(), "mounted filesystem");
        Ok(FileSystem { device, blockmap, session: None })
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn geometry(&self) -> Geometry {
        self.device.geometry()
    }

    pub fn max_file_size(&self) -> usize {
        self.geometry().max_file_size()
    }

    pub fn free_blocks(&self) -> usize {
        self.blockmap.free_count()
    }

    pub fn open_descriptor(&self) -> Option<Descriptor> {
        self.session.as_ref().map(|session| session.descriptor)
    }

    pub fn create(&mut self, name: &str) -> Result<Descriptor> {
        let name = Self::validate_name(name)?;

        let mut free_slot = None;
        for slot in 0..self.inode_count() {
            let inode = self.device.read_inode(slot)?;
            if inode.has_name(name) {
                return Err(FsError::AlreadyExists(name.to_string()));
            }
            if !inode.is_used() && free_slot.is_none() {
                free_slot = Some(slot);
            }
        }
        let slot = free_slot.ok_or(FsError::TableFull)?;

        let inode = Inode::new(name);
        self.device.write_inode(&inode, slot)?;
        tracing::debug!(name, descriptor = slot, "created file");
        self.start_session(slot, inode);
        Ok(slot)
    }

    pub fn open(&mut self, name: &str) -> Result<Descriptor> {
        let (slot, inode) = self
            .find(name)?
            .ok_or_else(|| FsError::NotFound(name.trim().to_string()))?;
        tracing::debug!(name = name.trim(), descriptor = slot, "opened file");
        self.start_session(slot, inode);
        Ok(slot)
    }

    /// Flushes the open file's inode and ends the session.
    pub fn close(&mut self, descriptor: Descriptor) -> Result<()> {
        let session = match &self.session {
            Some(session) if session.descriptor == descriptor => session,
            _ => {
                return Err(FsError::DescriptorMismatch { given: descriptor, open: self.open_descriptor() });
            }
        };
        self.device.write_inode(&session.inode, descriptor)?;
        self.session = None;
        tracing::debug!(descriptor, "closed file");
        Ok(())
    }

    /// Removes the file and frees its blocks. Unknown names are ignored.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let (slot, mut inode) = match self.find(name)? {
            Some(found) => found,
            None => {
                tracing::debug!(name = name.trim(), "delete of unknown file ignored");
                return Ok(());
            }
        };

        let blocks = inode.blocks();
        inode.clear();
        self.device.write_inode(&inode, slot)?;
        if self.open_descriptor() == Some(slot) {
            self.session = None;
        }
        self.blockmap.release(&mut self.device, &blocks)?;
        tracing::debug!(name = name.trim(), descriptor = slot, "deleted file");
        Ok(())
    }

    pub fn read(&self, descriptor: Descriptor) -> Result<Vec<u8>> {
        let inode = &self.session_for(descriptor)?.inode;
        let size = inode.size as usize;
        if size == 0 {
            return Ok(Vec::new());
        }

        let block_size = self.geometry().block_size;
        let needed = size.div_ceil(block_size);
        let mut data = Vec::with_capacity(size);
        for i in 0..needed {
            let pointer = inode.pointers.get(i).copied().flatten().ok_or_else(|| {
                DeviceError::Corrupt(format!("descriptor {} has no block for chunk {}", descriptor, i))
            })?;
            let block = self.device.read_block(pointer)?;
            let take = (size - i * block_size).min(block_size);
            data.extend_from_slice(&block[..take]);
        }
        Ok(data)
    }

    /// Replaces the whole content of the open file with `data`.
    ///
    /// The old blocks are released first, so on `FileTooLarge` or
    /// `InsufficientSpace` the file is left empty.
    pub fn write(&mut self, descriptor: Descriptor, data: &[u8]) -> Result<()> {
        let mut inode = self.session_for(descriptor)?.inode.clone();

        let old_blocks = inode.blocks();
        if !old_blocks.is_empty() || inode.size != 0 {
            inode.clear_pointers();
            inode.size = 0;
            self.commit(descriptor, &inode)?;
            self.blockmap.release(&mut self.device, &old_blocks)?;
        }

        let max = self.max_file_size();
        if data.len() > max {
            tracing::warn!(descriptor, size = data.len(), max, "write exceeds maximum file size");
            return Err(FsError::FileTooLarge { size: data.len(), max });
        }

        let block_size = self.geometry().block_size;
        let needed = data.len().div_ceil(block_size);
        let blocks = self.blockmap.find_and_claim(&mut self.device, needed)?;

        if let Err(e) = self.write_chunks(data, &blocks) {
            self.unclaim(descriptor, &blocks);
            return Err(e);
        }

        inode.set_pointers(&blocks);
        inode.size = data.len() as u64;
        if let Err(e) = self.commit(descriptor, &inode) {
            self.unclaim(descriptor, &blocks);
            return Err(e);
        }
        tracing::debug!(descriptor, size = data.len(), blocks = blocks.len(), "wrote file");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<FileInfo>> {
        let mut files = Vec::new();
        for slot in 0..self.inode_count() {
            let inode = self.device.read_inode(slot)?;
            if let Some(info) = FileInfo::from_inode(slot, &inode) {
                files.push(info);
            }
        }
        Ok(files)
    }

    pub fn stat(&self, name: &str) -> Result<FileInfo> {
        match self.find(name)? {
            Some((slot, inode)) => FileInfo::from_inode(slot, &inode)
                .ok_or_else(|| FsError::NotFound(name.trim().to_string())),
            None => Err(FsError::NotFound(name.trim().to_string())),
        }
    }

    /// The file in slot `descriptor`, if that slot is in use.
    pub fn entry(&self, descriptor: Descriptor) -> Result<Option<FileInfo>> {
        if descriptor >= self.inode_count() {
            return Ok(None);
        }
        let inode = self.device.read_inode(descriptor)?;
        Ok(FileInfo::from_inode(descriptor, &inode))
    }

    /// Verifies that inodes and the bitmap agree: each used inode holds
    /// exactly `ceil(size / block_size)` pointers, no block is referenced
    /// twice, a bit is set iff its block is referenced, and names are unique.
    pub fn check(&self) -> Result<()> {
        let geometry = self.geometry();
        let mut owners: Vec<Option<Descriptor>> = vec![None; geometry.block_count as usize];
        let mut names: Vec<String> = Vec::new();

        for slot in 0..self.inode_count() {
            let inode = self.device.read_inode(slot)?;
            let name = match &inode.name {
                Some(name) => name.trim().to_string(),
                None => {
                    if inode.used_pointers() != 0 || inode.size != 0 {
                        return Err(FsError::Inconsistent(format!("unused slot {} is not empty", slot)));
                    }
                    continue;
                }
            };
            if names.contains(&name) {
                return Err(FsError::Inconsistent(format!("name {} is used twice", name)));
            }
            names.push(name);

            let expected = (inode.size as usize).div_ceil(geometry.block_size);
            let blocks = inode.blocks();
            if blocks.len() != expected || inode.pointers[..expected].iter().any(Option::is_none) {
                return Err(FsError::Inconsistent(format!(
                    "slot {} has {} pointers for {} bytes",
                    slot,
                    blocks.len(),
                    inode.size
                )));
            }
            for block in blocks {
                let owner = owners.get_mut(block as usize).ok_or_else(|| {
                    FsError::Inconsistent(format!("slot {} points past the device: {}", slot, block))
                })?;
                if let Some(other) = owner {
                    return Err(FsError::Inconsistent(format!(
                        "block {} is shared by slots {} and {}",
                        block, other, slot
                    )));
                }
                *owner = Some(slot);
            }
        }

        let persisted = BlockMap::read(&self.device)?;
        for (block, owner) in owners.iter().enumerate() {
            let block = block as BlockPointer;
            let referenced = owner.is_some();
            if persisted.is_used(block) != referenced || self.blockmap.is_used(block) != referenced {
                return Err(FsError::Inconsistent(format!(
                    "block {} is {} but marked {}",
                    block,
                    if referenced { "referenced" } else { "unreferenced" },
                    if persisted.is_used(block) { "used" } else { "free" }
                )));
            }
        }
        Ok(())
    }

    fn inode_count(&self) -> usize {
        self.geometry().inode_count
    }

    fn validate_name(name: &str) -> Result<&str> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.len() > FILE_NAME_LENGTH {
            return Err(FsError::InvalidName(name.to_string()));
        }
        Ok(trimmed)
    }

    fn find(&self, name: &str) -> Result<Option<(Descriptor, Inode)>> {
        for slot in 0..self.inode_count() {
            let inode = self.device.read_inode(slot)?;
            if inode.has_name(name) {
                return Ok(Some((slot, inode)));
            }
        }
        Ok(None)
    }

    fn start_session(&mut self, descriptor: Descriptor, inode: Inode) {
        if let Some(previous) = self.session.replace(Session { descriptor, inode }) {
            if previous.descriptor != descriptor {
                tracing::warn!(previous = previous.descriptor, descriptor, "superseding open file");
            }
        }
    }

    fn session_for(&self, descriptor: Descriptor) -> Result<&Session> {
        match &self.session {
            Some(session) if session.descriptor == descriptor => Ok(session),
            _ => Err(FsError::InvalidDescriptor(descriptor)),
        }
    }

    /// Persists `inode` and mirrors it into the open session.
    fn commit(&mut self, descriptor: Descriptor, inode: &Inode) -> Result<()> {
        self.device.write_inode(inode, descriptor)?;
        if let Some(session) = self.session.as_mut() {
            if session.descriptor == descriptor {
                session.inode = inode.clone();
            }
        }
        Ok(())
    }

    /// Gives back blocks claimed by a failed write. A failure here only
    /// leaks the blocks, so it is logged and the write's own error wins.
    fn unclaim(&mut self, descriptor: Descriptor, blocks: &[BlockPointer]) {
        if let Err(e) = self.blockmap.release(&mut self.device, blocks) {
            tracing::error!(descriptor, blocks = ?blocks, %e, "could not release blocks of a failed write");
        }
    }

    fn write_chunks(&mut self, data: &[u8], blocks: &[BlockPointer]) -> Result<()> {
        let block_size = self.geometry().block_size;
        for (chunk, block) in data.chunks(block_size).zip(blocks) {
            if chunk.len() == block_size {
                self.device.write_block(chunk, *block)?;
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(block_size, 0);
                self.device.write_block(&padded, *block)?;
            }
        }
        Ok(())
    }
}
