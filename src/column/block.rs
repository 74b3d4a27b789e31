// DEFAULT_BLOCK_SIZE is the allocation granularity for arena blocks and
// the fixed column's backing buffer.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

// Assumed number of elements per block when projecting the next block size
// from the running value-size estimate.
const ITEMS_PER_BLOCK: usize = 32;

/// A fixed-capacity byte buffer supporting only monotonic append.
///
/// The storage is never resized or moved once allocated, so offsets handed
/// out by [`Block::append`] and [`Block::take_tail`] stay valid for the
/// block's entire lifetime.
pub(crate) struct Block {
    size: usize,
    storage: Box<[u8]>,
}

impl Block {
    pub fn new(capacity: usize) -> Self {
        Self {
            size: 0,
            storage: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn available(&self) -> usize {
        self.storage.len() - self.size
    }

    /// Copies `bytes` into the unused tail and returns the offset of the
    /// copied region. The caller must have checked `bytes.len()` against
    /// [`Block::available`]; this is the append hot path and does not
    /// re-verify.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        debug_assert!(bytes.len() <= self.available());
        let offset = self.size;
        self.storage[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.size += bytes.len();
        offset
    }

    /// Claims `len` bytes of the tail and exposes them for a direct write,
    /// so wire reads land in the block without an intermediate copy.
    /// Same contract as [`Block::append`]: the caller checks `available()`.
    pub fn take_tail(&mut self, len: usize) -> (usize, &mut [u8]) {
        debug_assert!(len <= self.available());
        let offset = self.size;
        self.size += len;
        (offset, &mut self.storage[offset..offset + len])
    }

    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.storage[offset..offset + len]
    }
}

/// Rounds `value` up to the next multiple of `multiple`.
pub(crate) fn round_up(value: usize, multiple: usize) -> usize {
    (value + multiple - 1) / multiple * multiple
}

/// Next reserved capacity for a contiguous buffer that currently holds
/// `current` bytes and is about to grow by `element_size`, aligned to
/// `granularity`.
pub(crate) fn next_capacity(current: usize, element_size: usize, granularity: usize) -> usize {
    ((current + element_size) / granularity + 1) * granularity
}

/// Average element size observed over a complete set of values, floored
/// at 1 so it can always be used as a divisor and block multiplier.
pub(crate) fn estimate_value_size(total_bytes: usize, count: usize) -> usize {
    let count = count.max(1);
    let estimate = (total_bytes + count - 1) / count;
    estimate.max(1)
}

/// Size for the next arena block given the running value-size estimate.
pub(crate) fn next_block_size(value_size_estimate: usize) -> usize {
    DEFAULT_BLOCK_SIZE.max(value_size_estimate * ITEMS_PER_BLOCK)
}
