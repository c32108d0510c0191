use std::mem::size_of;

use crate::consts::{
    BlockPointer, DirectPointers, DIRECT_POINTERS, EMPTY_POINTERS, FILE_NAME_LENGTH, NULL_POINTER,
};
use crate::util::error::DeviceError;
use crate::util::serializable::{ensure_length, read_u64, ByteSerializable, KnownSize};

const NAME_OFFSET: usize = 1;
const SIZE_OFFSET: usize = NAME_OFFSET + FILE_NAME_LENGTH;
const POINTERS_OFFSET: usize = SIZE_OFFSET + size_of::<u64>();

/// Metadata of one inode slot. A slot without a name is unused.
///
/// Pointer `i` holds bytes `[i * block_size, (i + 1) * block_size)` of the
/// file; the used pointers always form a prefix of the array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inode {
    pub name: Option<String>,
    pub size: u64,
    pub pointers: DirectPointers,
}

impl Inode {
    pub fn new(name: &str) -> Inode {
        Inode { name: Some(name.to_string()), size: 0, pointers: EMPTY_POINTERS }
    }

    pub fn empty() -> Inode {
        Inode::default()
    }

    pub fn is_used(&self) -> bool {
        self.name.is_some()
    }

    /// Name comparison ignores surrounding whitespace on both sides.
    pub fn has_name(&self, name: &str) -> bool {
        match &self.name {
            Some(own) => own.trim() == name.trim(),
            None => false,
        }
    }

    pub fn blocks(&self) -> Vec<BlockPointer> {
        self.pointers.iter().flatten().copied().collect()
    }

    pub fn used_pointers(&self) -> usize {
        self.pointers.iter().filter(|pointer| pointer.is_some()).count()
    }

    pub fn set_pointers(&mut self, blocks: &[BlockPointer]) {
        self.pointers = EMPTY_POINTERS;
        for (slot, block) in self.pointers.iter_mut().zip(blocks) {
            *slot = Some(*block);
        }
    }

    pub fn clear_pointers(&mut self) {
        self.pointers = EMPTY_POINTERS;
    }

    /// Turns the slot back into an unused one.
    pub fn clear(&mut self) {
        self.name = None;
        self.size = 0;
        self.clear_pointers();
    }
}

impl KnownSize for Inode {
    #[inline]
    fn size_on_disk() -> usize {
        POINTERS_OFFSET + DIRECT_POINTERS * size_of::<BlockPointer>()
    }
}

impl ByteSerializable for Inode {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Inode::size_on_disk());
        let mut name = [0u8; FILE_NAME_LENGTH];
        let name_len = match &self.name {
            Some(own) => {
                let mut len = own.len().min(FILE_NAME_LENGTH);
                while !own.is_char_boundary(len) {
                    len -= 1;
                }
                name[..len].copy_from_slice(&own.as_bytes()[..len]);
                len
            }
            None => 0,
        };
        bytes.push(name_len as u8);
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&self.size.to_le_bytes());
        for pointer in self.pointers.iter() {
            bytes.extend_from_slice(&pointer.unwrap_or(NULL_POINTER).to_le_bytes());
        }
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Inode, DeviceError> {
        ensure_length(bytes, Inode::size_on_disk())?;

        let name_len = bytes[0] as usize;
        if name_len > FILE_NAME_LENGTH {
            return Err(DeviceError::Corrupt(format!("inode name length {}", name_len)));
        }
        let name = if name_len == 0 {
            None
        } else {
            let raw = &bytes[NAME_OFFSET..NAME_OFFSET + name_len];
            let name = std::str::from_utf8(raw)
                .map_err(|e| DeviceError::Corrupt(format!("inode name is not utf-8: {}", e)))?;
            Some(name.to_string())
        };

        let size = read_u64(bytes, SIZE_OFFSET);
        let mut pointers = EMPTY_POINTERS;
        for (i, pointer) in pointers.iter_mut().enumerate() {
            let raw = read_u64(bytes, POINTERS_OFFSET + i * size_of::<BlockPointer>());
            if raw != NULL_POINTER {
                *pointer = Some(raw);
            }
        }

        Ok(Inode { name, size, pointers })
    }
}
