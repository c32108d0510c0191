use bitvec::prelude::{BitVec, Lsb0};

/// Fixed-size bit set, one bit per tracked resource. Bit `i` lives in byte
/// `i / 8` at position `i % 8`, which is also how it is laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: BitVec<u8, Lsb0>,
}

impl Bitmap {
    pub fn new(len: usize) -> Bitmap {
        Bitmap { bits: BitVec::repeat(false, len) }
    }

    /// Builds a bitmap of `len` bits from its packed form. Missing bytes read
    /// as free, surplus bytes and trailing bits past `len` are dropped.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Bitmap {
        let mut raw = bytes.to_vec();
        raw.resize(Bitmap::byte_len(len), 0);
        let mut bits = BitVec::<u8, Lsb0>::from_vec(raw);
        bits.truncate(len);
        bits.set_uninitialized(false);
        Bitmap { bits }
    }

    #[inline]
    pub fn byte_len(len: usize) -> usize {
        len.div_ceil(8)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn test(&self, index: usize) -> bool {
        self.bits.get(index).map(|bit| *bit).unwrap_or(false)
    }

    pub fn set(&mut self, index: usize) {
        self.bits.set(index, true);
    }

    pub fn clear(&mut self, index: usize) {
        self.bits.set(index, false);
    }

    pub fn find_first_clear(&self) -> Option<usize> {
        self.bits.first_zero()
    }

    /// Clear bits in ascending order.
    pub fn iter_clear(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_zeros()
    }

    pub fn count_set(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn count_clear(&self) -> usize {
        self.bits.count_zeros()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}
