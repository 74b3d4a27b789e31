use super::block::{next_capacity, DEFAULT_BLOCK_SIZE};
use crate::error::Result;
use crate::wire::WireFormat;
use crate::Error;
use std::io::{Read, Write};
use std::mem;

/// Fixed-width string column: one contiguous buffer of equal-size slots.
///
/// Values shorter than the slot are right-padded with zero bytes. Elements
/// are addressed by offset arithmetic, so the buffer is free to relocate
/// as it grows.
pub struct FixedStringColumn {
    element_size: usize,
    data: Vec<u8>,
}

impl FixedStringColumn {
    pub fn new(element_size: usize) -> Result<Self> {
        if element_size == 0 {
            return Err(Error::Validation(
                "fixed string element size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            element_size,
            data: Vec::new(),
        })
    }

    /// Width of every slot in bytes.
    pub fn fixed_size(&self) -> usize {
        self.element_size
    }

    /// Appends `value`, zero-padded to the slot width. Values longer than
    /// the slot are rejected and leave the column unchanged.
    pub fn append(&mut self, value: &[u8]) -> Result<()> {
        if value.len() > self.element_size {
            return Err(Error::Validation(format!(
                "expected string of length not greater than {} bytes, received {} bytes",
                self.element_size,
                value.len()
            )));
        }

        // Grow in block-aligned steps to amortize reallocation
        if self.data.capacity() - self.data.len() < self.element_size {
            let target = next_capacity(self.data.len(), self.element_size, DEFAULT_BLOCK_SIZE);
            self.data.reserve(target - self.data.len());
        }

        self.data.extend_from_slice(value);
        self.data.resize(self.data.len() + (self.element_size - value.len()), 0);
        Ok(())
    }

    /// Appends every slot of `other`; a differing slot width makes this a
    /// silent no-op.
    pub fn append_column(&mut self, other: &FixedStringColumn) {
        if self.element_size == other.element_size {
            self.data.extend_from_slice(&other.data);
        } else {
            tracing::debug!(
                ours = self.element_size,
                theirs = other.element_size,
                "ignoring append between fixed string columns of different widths"
            );
        }
    }

    pub fn size(&self) -> usize {
        self.data.len() / self.element_size
    }

    pub fn at(&self, index: usize) -> Result<&[u8]> {
        if index >= self.size() {
            return Err(Error::OutOfBounds {
                index,
                size: self.size(),
            });
        }
        let pos = index * self.element_size;
        Ok(&self.data[pos..pos + self.element_size])
    }

    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(self.element_size * additional);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Copies the slots in `[begin, begin + len)`, clamped to the column's
    /// bounds, into a new column of the same width.
    pub fn slice(&self, begin: usize, len: usize) -> FixedStringColumn {
        let mut result = FixedStringColumn {
            element_size: self.element_size,
            data: Vec::new(),
        };
        if begin < self.size() {
            let b = begin * self.element_size;
            let l = len.min(self.size() - begin) * self.element_size;
            result.data = self.data[b..b + l].to_vec();
        }
        result
    }

    pub fn clone_empty(&self) -> FixedStringColumn {
        FixedStringColumn {
            element_size: self.element_size,
            data: Vec::new(),
        }
    }

    pub fn swap(&mut self, other: &mut FixedStringColumn) {
        mem::swap(self, other);
    }

    pub fn memory_usage(&self) -> usize {
        self.data.capacity()
    }

    /// Resizes to exactly `element_size * rows` and fills the buffer with
    /// one raw read; a short stream fails the load.
    pub fn load_body<R: Read>(&mut self, reader: &mut R, rows: usize) -> Result<()> {
        self.data.resize(self.element_size * rows, 0);
        WireFormat::read_bytes(reader, &mut self.data)?;
        tracing::debug!(rows, "loaded fixed string column body");
        Ok(())
    }

    /// Writes the whole buffer with no per-element framing.
    pub fn save_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        WireFormat::write_bytes(writer, &self.data)
    }
}
