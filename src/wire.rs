use crate::error::Result;
use crate::Error;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Length-prefixed binary primitives shared by all column bodies.
///
/// Variable-length payloads are framed as a fixed 8-byte little-endian
/// length followed by the raw bytes; fixed-width payloads are written as-is.
pub struct WireFormat;

impl WireFormat {
    /// Fills `buf` from the stream, failing on a short read.
    pub fn read_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
        reader
            .read_exact(buf)
            .map_err(|e| Error::ReadError("column body bytes", e))
    }

    pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
        reader
            .read_u64::<LittleEndian>()
            .map_err(|e| Error::ReadError("length prefix", e))
    }

    pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
        writer
            .write_all(bytes)
            .map_err(|e| Error::WriteError("column body bytes", e))
    }

    pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<()> {
        writer
            .write_u64::<LittleEndian>(value)
            .map_err(|e| Error::WriteError("length prefix", e))
    }

    /// Writes the length prefix followed by the payload.
    pub fn write_string<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
        Self::write_u64(writer, bytes.len() as u64)?;
        Self::write_bytes(writer, bytes)
    }
}
