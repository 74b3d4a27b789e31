use super::block::{
    estimate_value_size, next_block_size, round_up, Block, DEFAULT_BLOCK_SIZE,
};
use crate::error::Result;
use crate::wire::WireFormat;
use crate::Error;
use std::io::{Read, Write};
use std::mem;

// Starting value-size estimate for columns built without any observed data.
const DEFAULT_VALUE_SIZE_ESTIMATE: usize = 8;

/// Locates one logical element's bytes in the column's backing storage.
///
/// `Arena` and `Owned` spans are index-based, so they survive reallocation
/// of the containers that hold the blocks and buffers; the blocks and
/// buffers themselves never move or shrink while the column owns them.
/// `External` is the unchecked-borrow append mode and carries a raw
/// pointer whose lifetime is the caller's responsibility.
#[derive(Clone, Copy)]
enum Span {
    Arena { block: usize, offset: usize, len: usize },
    Owned { buf: usize, len: usize },
    External { ptr: *const u8, len: usize },
}

impl Span {
    fn len(&self) -> usize {
        match *self {
            Span::Arena { len, .. } => len,
            Span::Owned { len, .. } => len,
            Span::External { len, .. } => len,
        }
    }
}

/// Variable-width string column backed by non-relocating arena blocks.
///
/// Elements are byte spans into storage the column owns (arena blocks for
/// copied values, dedicated buffers for ownership-transferred values), so
/// reads are zero-copy and appends never invalidate earlier elements.
pub struct StringColumn {
    items: Vec<Span>,
    blocks: Vec<Block>,
    owned: Vec<Vec<u8>>,
    value_size_estimate: usize,
    next_block_size: usize,
}

impl Default for StringColumn {
    fn default() -> Self {
        Self::new()
    }
}

impl StringColumn {
    pub fn new() -> Self {
        Self::with_estimated_value_size(DEFAULT_VALUE_SIZE_ESTIMATE)
    }

    /// Empty column whose block sizing assumes elements of roughly
    /// `estimate` bytes until real data refines it.
    pub fn with_estimated_value_size(estimate: usize) -> Self {
        Self {
            items: Vec::new(),
            blocks: Vec::new(),
            owned: Vec::new(),
            value_size_estimate: estimate,
            next_block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Empty column pre-sized for `count` elements of roughly `estimate`
    /// bytes each, with one block allocated up front.
    pub fn with_capacity(count: usize, estimate: usize) -> Self {
        let mut column = Self::with_estimated_value_size(estimate);
        column.items.reserve(count);
        column.blocks.push(Block::new(
            DEFAULT_BLOCK_SIZE.max(round_up(count * estimate, DEFAULT_BLOCK_SIZE)),
        ));
        column
    }

    /// Builds a column by copying every value into a single block sized
    /// exactly to the total byte length, then derives the value-size
    /// estimate from the observed average.
    pub fn from_slices<T: AsRef<[u8]>>(values: &[T]) -> Self {
        let total: usize = values.iter().map(|v| v.as_ref().len()).sum();

        let mut column = Self::new();
        column.items.reserve(values.len());
        column.blocks.push(Block::new(total));
        for value in values {
            column.append_to_current_block(value.as_ref());
        }
        column.value_size_estimate = estimate_value_size(total, values.len());
        column
    }

    /// Builds a column by taking ownership of every string; no bytes are
    /// copied, each string backs its own element directly.
    pub fn from_strings(values: Vec<String>) -> Self {
        let mut column = Self::new();
        column.items.reserve(values.len());

        let mut total = 0;
        for value in values {
            let buf = value.into_bytes();
            total += buf.len();
            column.push_owned(buf);
        }
        column.value_size_estimate = estimate_value_size(total, column.items.len());
        column
    }

    /// Appends by copying `value` into the current arena block, allocating
    /// a new block when the current one lacks room.
    pub fn append(&mut self, value: &[u8]) {
        if self.blocks.last().map_or(true, |b| b.available() < value.len()) {
            let capacity = self.next_block_size.max(value.len());
            tracing::trace!(capacity, "allocating arena block");
            self.blocks.push(Block::new(capacity));
            self.next_block_size = next_block_size(self.value_size_estimate);
        }
        self.append_to_current_block(value);
    }

    /// Appends by taking ownership of `value`; its bytes are never copied.
    pub fn append_owned(&mut self, value: Vec<u8>) {
        self.push_owned(value);
    }

    /// Appends a view over caller-owned memory without copying and without
    /// tracking ownership.
    ///
    /// # Safety
    ///
    /// The memory behind `value` must remain valid and unmodified for the
    /// entire lifetime of this column (including any column it is swapped
    /// into). Nothing enforces this; use only for zero-copy ingestion from
    /// a buffer whose lifetime the caller fully controls.
    pub unsafe fn append_borrowed(&mut self, value: &[u8]) {
        self.items.push(Span::External {
            ptr: value.as_ptr(),
            len: value.len(),
        });
    }

    /// Appends every element of `other` by copy, pre-sizing one block for
    /// the source's total byte length unless the current block already has
    /// room.
    pub fn append_column(&mut self, other: &StringColumn) {
        let total: usize = other.items.iter().map(Span::len).sum();

        if self.blocks.last().map_or(true, |b| b.available() < total) {
            self.blocks.push(Block::new(self.next_block_size.max(total)));
            self.next_block_size = next_block_size(self.value_size_estimate);
        }

        for span in &other.items {
            self.append_to_current_block(other.resolve(span));
        }
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn at(&self, index: usize) -> Result<&[u8]> {
        match self.items.get(index) {
            Some(span) => Ok(self.resolve(span)),
            None => Err(Error::OutOfBounds {
                index,
                size: self.items.len(),
            }),
        }
    }

    /// Prepares the column for `additional` more elements: either
    /// pre-allocates a block sized from the value-size estimate, or widens
    /// the next block to cover the elements the current block cannot hold.
    pub fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);

        match self.blocks.last() {
            Some(block) if block.available() >= self.value_size_estimate => {
                let remaining = if self.value_size_estimate > 0 {
                    additional.saturating_sub(block.available() / self.value_size_estimate)
                } else {
                    additional
                };
                self.next_block_size =
                    DEFAULT_BLOCK_SIZE.max(remaining * self.value_size_estimate);
            }
            _ => {
                self.blocks
                    .push(Block::new(additional * self.value_size_estimate));
            }
        }
    }

    pub fn set_estimated_value_size(&mut self, estimate: usize) {
        self.value_size_estimate = estimate;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.blocks.clear();
        self.owned = Vec::new();
    }

    /// Copies the elements in `[begin, begin + len)`, clamped to the
    /// column's bounds, into a new column with one block sized to the
    /// range's total byte length.
    pub fn slice(&self, begin: usize, len: usize) -> StringColumn {
        if begin >= self.items.len() {
            return self.clone_empty();
        }
        let len = len.min(self.items.len() - begin);
        let range = &self.items[begin..begin + len];
        let total: usize = range.iter().map(Span::len).sum();

        let mut result = Self::with_estimated_value_size(self.value_size_estimate);
        result.items.reserve(len);
        result.blocks.push(Block::new(DEFAULT_BLOCK_SIZE.max(total)));
        for span in range {
            result.append_to_current_block(self.resolve(span));
        }
        result
    }

    pub fn clone_empty(&self) -> StringColumn {
        Self::with_estimated_value_size(self.value_size_estimate)
    }

    /// Exchanges the element views and all backing storage with `other` in
    /// constant time; the size estimates stay with their columns.
    pub fn swap(&mut self, other: &mut StringColumn) {
        mem::swap(&mut self.items, &mut other.items);
        mem::swap(&mut self.blocks, &mut other.blocks);
        mem::swap(&mut self.owned, &mut other.owned);
    }

    /// Bytes reserved by the column: every owned buffer's capacity, the
    /// container capacities, and the full capacity of every block whether
    /// used or not.
    pub fn memory_usage(&self) -> usize {
        let mut total: usize = self.owned.iter().map(|b| b.capacity()).sum();
        total += self.owned.capacity() * mem::size_of::<Vec<u8>>();
        total += self.items.capacity() * mem::size_of::<Span>();
        total += self.blocks.capacity() * mem::size_of::<Block>();
        total += self.blocks.iter().map(|b| b.capacity()).sum::<usize>();
        total
    }

    /// Reads `rows` length-prefixed elements, writing payload bytes
    /// straight into freshly allocated block tails. The new state replaces
    /// the old one only after every read succeeds; the value-size estimate
    /// is kept.
    pub fn load_body<R: Read>(&mut self, reader: &mut R, rows: usize) -> Result<()> {
        if rows == 0 {
            self.items.clear();
            self.blocks.clear();
            return Ok(());
        }

        let mut new_items = Vec::with_capacity(rows);
        let mut new_blocks = vec![Block::new(DEFAULT_BLOCK_SIZE)];

        for _ in 0..rows {
            let len = WireFormat::read_u64(reader)? as usize;

            if new_blocks.last().map_or(true, |b| b.available() < len) {
                new_blocks.push(Block::new(DEFAULT_BLOCK_SIZE.max(len)));
            }
            let block = new_blocks.len() - 1;
            let (offset, tail) = new_blocks[block].take_tail(len);
            WireFormat::read_bytes(reader, tail)?;
            new_items.push(Span::Arena { block, offset, len });
        }

        tracing::debug!(rows, blocks = new_blocks.len(), "loaded string column body");
        self.items = new_items;
        self.blocks = new_blocks;
        Ok(())
    }

    /// Writes every element in index order as a length prefix followed by
    /// its payload.
    pub fn save_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        for span in &self.items {
            WireFormat::write_string(writer, self.resolve(span))?;
        }
        Ok(())
    }

    fn push_owned(&mut self, buf: Vec<u8>) {
        let len = buf.len();
        self.owned.push(buf);
        self.items.push(Span::Owned {
            buf: self.owned.len() - 1,
            len,
        });
    }

    // Copies into the current block without a room check; callers have
    // already sized the block.
    fn append_to_current_block(&mut self, bytes: &[u8]) {
        let block = self.blocks.len() - 1;
        let offset = self.blocks[block].append(bytes);
        self.items.push(Span::Arena {
            block,
            offset,
            len: bytes.len(),
        });
    }

    fn resolve(&self, span: &Span) -> &[u8] {
        match *span {
            Span::Arena { block, offset, len } => self.blocks[block].slice(offset, len),
            Span::Owned { buf, .. } => &self.owned[buf],
            // Sound only if the append_borrowed caller upheld its contract.
            Span::External { ptr, len } => unsafe { std::slice::from_raw_parts(ptr, len) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Column whose arena starts with a 4-byte block and keeps allocating
    // 4-byte blocks, to force multi-block layouts with tiny inputs.
    fn tiny_block_column() -> StringColumn {
        let mut column = StringColumn::new();
        column.blocks.push(Block::new(4));
        column.next_block_size = 4;
        column
    }

    fn collect(column: &StringColumn) -> Vec<Vec<u8>> {
        (0..column.size())
            .map(|i| column.at(i).expect("element in range").to_vec())
            .collect()
    }

    #[test]
    fn test_append_and_read_back() {
        let mut column = StringColumn::new();
        column.append(b"foo");
        column.append(b"");
        column.append(b"barbaz");

        assert_eq!(column.size(), 3);
        assert_eq!(column.at(0).unwrap(), b"foo");
        assert_eq!(column.at(1).unwrap(), b"");
        assert_eq!(column.at(2).unwrap(), b"barbaz");
    }

    #[test]
    fn test_appends_spanning_multiple_blocks() {
        // 4-byte blocks: "ab" lands in the first block, "cdef" no longer
        // fits next to it and forces a second block
        let mut column = tiny_block_column();
        column.append(b"ab");
        column.append(b"cdef");
        column.append(b"");

        assert!(column.blocks.len() >= 2);
        assert_eq!(column.size(), 3);
        assert_eq!(column.at(0).unwrap(), b"ab");
        assert_eq!(column.at(1).unwrap(), b"cdef");
        assert_eq!(column.at(2).unwrap(), b"");
    }

    #[test]
    fn test_oversized_value_gets_dedicated_block() {
        let mut column = tiny_block_column();
        let big = vec![b'x'; 100];
        column.append(b"ab");
        column.append(&big);

        assert_eq!(column.at(0).unwrap(), b"ab");
        assert_eq!(column.at(1).unwrap(), big.as_slice());
    }

    #[test]
    fn test_earlier_views_survive_later_appends() {
        let mut column = tiny_block_column();
        column.append(b"ab");
        let before = column.at(0).unwrap().to_vec();

        // Enough appends to allocate several new blocks
        for _ in 0..64 {
            column.append(b"xyz");
        }
        assert_eq!(column.at(0).unwrap(), before.as_slice());
    }

    #[test]
    fn test_three_append_modes_interleaved() {
        let external = b"borrowed".to_vec();

        let mut column = StringColumn::new();
        column.append(b"copied");
        column.append_owned(b"owned".to_vec());
        unsafe { column.append_borrowed(&external) };
        column.append(b"copied again");

        assert_eq!(column.size(), 4);
        assert_eq!(column.at(0).unwrap(), b"copied");
        assert_eq!(column.at(1).unwrap(), b"owned");
        assert_eq!(column.at(2).unwrap(), b"borrowed");
        assert_eq!(column.at(3).unwrap(), b"copied again");
    }

    #[test]
    fn test_from_slices_derives_estimate() {
        let column = StringColumn::from_slices(&[b"ab".as_slice(), b"cdef", b"ghijkl"]);

        assert_eq!(column.size(), 3);
        assert_eq!(column.at(1).unwrap(), b"cdef");
        // ceil(12 / 3) == 4
        assert_eq!(column.value_size_estimate, 4);
        // All values were copied into one exactly-sized block
        assert_eq!(column.blocks.len(), 1);
        assert_eq!(column.blocks[0].capacity(), 12);
    }

    #[test]
    fn test_from_slices_empty() {
        let column = StringColumn::from_slices::<&[u8]>(&[]);
        assert_eq!(column.size(), 0);
        assert_eq!(column.value_size_estimate, 1);
    }

    #[test]
    fn test_from_strings_takes_ownership() {
        let column =
            StringColumn::from_strings(vec!["one".to_string(), "three".to_string()]);

        assert_eq!(column.size(), 2);
        assert_eq!(column.at(0).unwrap(), b"one");
        assert_eq!(column.at(1).unwrap(), b"three");
        // Nothing went through the arena
        assert!(column.blocks.is_empty());
        assert_eq!(column.owned.len(), 2);
        // ceil(8 / 2) == 4
        assert_eq!(column.value_size_estimate, 4);
    }

    #[test]
    fn test_at_out_of_bounds() {
        let mut column = StringColumn::new();
        column.append(b"only");

        let result = column.at(1);
        assert!(matches!(
            result,
            Err(Error::OutOfBounds { index: 1, size: 1 })
        ));
    }

    #[test]
    fn test_reserve_presizes_single_block() {
        let mut column = StringColumn::with_estimated_value_size(8);
        column.reserve(100);
        assert_eq!(column.blocks.len(), 1);

        // 100 elements at the estimated size all fit the reserved block
        for _ in 0..100 {
            column.append(b"12345678");
        }
        assert_eq!(column.blocks.len(), 1);
        assert_eq!(column.size(), 100);
    }

    #[test]
    fn test_with_capacity_rounds_block_up() {
        let column = StringColumn::with_capacity(1000, 10);
        assert_eq!(column.blocks.len(), 1);
        // 10_000 bytes rounded up to the block granularity
        assert_eq!(column.blocks[0].capacity(), 12288);
    }

    #[test]
    fn test_clear_drops_storage() {
        let mut column = StringColumn::new();
        column.append(b"data");
        column.append_owned(b"more".to_vec());
        column.clear();

        assert_eq!(column.size(), 0);
        assert!(column.blocks.is_empty());
        assert!(column.owned.is_empty());
        assert!(matches!(column.at(0), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_slice_copies_range() {
        let mut column = StringColumn::new();
        for value in [b"a".as_slice(), b"bb", b"ccc", b"dddd", b"eeeee"] {
            column.append(value);
        }

        let sliced = column.slice(1, 3);
        assert_eq!(
            collect(&sliced),
            vec![b"bb".to_vec(), b"ccc".to_vec(), b"dddd".to_vec()]
        );
    }

    #[test]
    fn test_slice_clamps_length() {
        let column = StringColumn::from_slices(&[b"a".as_slice(), b"b", b"c"]);
        let sliced = column.slice(2, 10);
        assert_eq!(collect(&sliced), vec![b"c".to_vec()]);
    }

    #[test]
    fn test_slice_out_of_range_begin_is_empty() {
        let column = StringColumn::from_slices(&[b"a".as_slice(), b"b"]);
        let sliced = column.slice(5, 1);
        assert_eq!(sliced.size(), 0);
        assert_eq!(sliced.value_size_estimate, column.value_size_estimate);
    }

    #[test]
    fn test_clone_empty_keeps_estimate() {
        let mut column = StringColumn::with_estimated_value_size(64);
        column.append(b"value");

        let empty = column.clone_empty();
        assert_eq!(empty.size(), 0);
        assert_eq!(empty.value_size_estimate, 64);
    }

    #[test]
    fn test_swap_twice_is_identity() {
        let mut left = StringColumn::from_slices(&[b"l1".as_slice(), b"l2"]);
        let mut right = StringColumn::from_strings(vec!["r1".to_string()]);

        let left_before = collect(&left);
        let right_before = collect(&right);

        left.swap(&mut right);
        assert_eq!(collect(&left), right_before);
        assert_eq!(collect(&right), left_before);

        left.swap(&mut right);
        assert_eq!(collect(&left), left_before);
        assert_eq!(collect(&right), right_before);
    }

    #[test]
    fn test_memory_usage_is_monotonic() {
        let mut column = StringColumn::new();
        let mut last = column.memory_usage();

        for round in 0..200 {
            if round % 3 == 0 {
                column.append_owned(vec![b'o'; 40]);
            } else {
                column.append(&vec![b'c'; 33]);
            }
            let current = column.memory_usage();
            assert!(current >= last);
            last = current;
        }
        // Blocks are counted at full capacity, so usage covers the data
        assert!(last > 200 * 33);
    }

    #[test]
    fn test_append_column_copies_elements() {
        let mut target = StringColumn::new();
        target.append(b"first");

        let source = StringColumn::from_slices(&[b"second".as_slice(), b"third"]);
        target.append_column(&source);

        assert_eq!(
            collect(&target),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
        // Source untouched
        assert_eq!(source.size(), 2);
    }

    #[test]
    fn test_append_empty_column_is_noop() {
        let mut target = StringColumn::new();
        target.append(b"only");
        target.append_column(&StringColumn::new());
        assert_eq!(target.size(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut column = StringColumn::new();
        column.append(b"ab");
        column.append_owned(b"cdef".to_vec());
        column.append(b"");

        let mut buf = Vec::new();
        column.save_body(&mut buf).expect("Failed to save body");

        let mut restored = column.clone_empty();
        restored
            .load_body(&mut Cursor::new(buf), 3)
            .expect("Failed to load body");

        assert_eq!(collect(&restored), collect(&column));
    }

    #[test]
    fn test_load_zero_rows_clears() {
        let mut column = StringColumn::from_slices(&[b"stale".as_slice()]);
        column
            .load_body(&mut Cursor::new(Vec::new()), 0)
            .expect("Failed to load empty body");

        assert_eq!(column.size(), 0);
        assert!(column.blocks.is_empty());
    }

    #[test]
    fn test_load_spanning_multiple_blocks() {
        // One value larger than the default block forces a dedicated block
        let big = vec![b'z'; DEFAULT_BLOCK_SIZE + 100];
        let mut column = StringColumn::new();
        column.append(b"small");
        column.append(&big);
        column.append(b"tail");

        let mut buf = Vec::new();
        column.save_body(&mut buf).unwrap();

        let mut restored = StringColumn::new();
        restored.load_body(&mut Cursor::new(buf), 3).unwrap();

        assert!(restored.blocks.len() >= 2);
        assert_eq!(collect(&restored), collect(&column));
    }

    #[test]
    fn test_load_short_stream_fails_and_preserves_contents() {
        let mut column = StringColumn::new();
        column.append(b"existing");

        // Stream promises 32 payload bytes but ends after 4
        let mut buf = Vec::new();
        WireFormat::write_u64(&mut buf, 32).unwrap();
        buf.extend_from_slice(b"abcd");

        let result = column.load_body(&mut Cursor::new(buf), 1);
        assert!(matches!(result, Err(Error::ReadError(_, _))));
        // Fresh state is swapped in only on success
        assert_eq!(column.at(0).unwrap(), b"existing");
    }

    #[test]
    fn test_load_missing_length_prefix_fails() {
        let mut column = StringColumn::new();
        let result = column.load_body(&mut Cursor::new(vec![1u8, 2, 3]), 1);
        assert!(matches!(result, Err(Error::ReadError("length prefix", _))));
    }
}
