//! Structured binary I/O for dictionary files.
//!
//! [`StructWriter`] and [`StructReader`] wrap a storage stream with the
//! primitive codecs every region of a dictionary file is built from:
//! little-endian integers, varints, UTF-16 strings with a varint unit count,
//! and `i32`-count-prefixed `u32` ID arrays.
//!
//! The writer keeps a running CRC32 over everything it emits and appends it as
//! a 4-byte trailer on [`StructWriter::close`]; [`verify_checksum`] checks that
//! trailer against the file contents.

use std::io::{self, Read, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32Hasher;

use crate::error::{JitenError, Result};
use crate::storage::{Storage, StorageInput, StorageOutput};
use crate::util::varint::{encode_u32, read_u32 as read_varint_u32};

/// Size of the checksum trailer at the end of every file.
pub const CHECKSUM_TRAILER_LEN: u64 = 4;

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: Crc32Hasher,
    position: u64,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: Crc32Hasher::new(),
            position: 0,
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    /// Write a u16 value (little-endian).
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write an i32 value (little-endian).
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u32) -> Result<()> {
        let encoded = encode_u32(value);
        self.write_raw(&encoded)
    }

    /// Write an element count as an `i32`.
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        let count = i32::try_from(count)
            .map_err(|_| JitenError::invalid_operation(format!("count {count} exceeds i32")))?;
        self.write_i32(count)
    }

    /// Write a string as a varint UTF-16 unit count followed by the units.
    pub fn write_utf16(&mut self, value: &str) -> Result<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_utf16_units(&units)
    }

    /// Write pre-encoded UTF-16 units with a varint count prefix.
    pub fn write_utf16_units(&mut self, units: &[u16]) -> Result<()> {
        let count = u32::try_from(units.len())
            .map_err(|_| JitenError::invalid_operation("string too long"))?;
        self.write_varint(count)?;
        for &unit in units {
            self.write_u16(unit)?;
        }
        Ok(())
    }

    /// Write an `i32` count followed by the IDs.
    pub fn write_id_array(&mut self, ids: &[u32]) -> Result<()> {
        self.write_count(ids.len())?;
        let mut bytes = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            bytes.write_u32::<LittleEndian>(id)?;
        }
        self.write_raw(&bytes)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.hasher.update(value);
        self.position += value.len() as u64;
        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Checksum of everything written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Append the checksum trailer, then flush and close the writer.
    pub fn close(mut self) -> Result<()> {
        let checksum = self.checksum();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush_and_sync()?;
        self.writer.close()?;
        Ok(())
    }
}

impl<W: StorageOutput> Write for StructWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_raw(buf).map_err(into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// A structured file reader for binary data.
#[derive(Debug)]
pub struct StructReader<R: StorageInput> {
    reader: R,
    position: u64,
    file_size: u64,
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured file reader positioned at the start.
    pub fn new(reader: R) -> Result<Self> {
        let file_size = reader.size()?;
        Ok(StructReader {
            reader,
            position: 0,
            file_size,
        })
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    /// Read a u16 value (little-endian).
    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.reader.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read an i32 value (little-endian).
    pub fn read_i32(&mut self) -> Result<i32> {
        let value = self.reader.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u32> {
        let mut counting = CountingReader {
            inner: &mut self.reader,
            count: 0,
        };
        let value = read_varint_u32(&mut counting)?;
        self.position += counting.count;
        Ok(value)
    }

    /// Read an `i32` element count, rejecting negative values and counts that
    /// could not fit in the rest of the file at `min_element_size` bytes each.
    pub fn read_count(&mut self, what: &str, min_element_size: u64) -> Result<usize> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(JitenError::format(format!("negative {what} count {count}")));
        }
        let needed = count as u64 * min_element_size;
        if needed > self.remaining() {
            return Err(JitenError::format(format!(
                "{what} count {count} exceeds remaining file length"
            )));
        }
        Ok(count as usize)
    }

    /// Read a varint-prefixed UTF-16 string.
    pub fn read_utf16(&mut self) -> Result<String> {
        let units = self.read_utf16_units()?;
        String::from_utf16(&units).map_err(|e| JitenError::format(format!("Invalid UTF-16: {e}")))
    }

    /// Read varint-prefixed UTF-16 units.
    pub fn read_utf16_units(&mut self) -> Result<Vec<u16>> {
        let count = self.read_varint()? as u64;
        if count * 2 > self.remaining() {
            return Err(JitenError::format(format!(
                "string length {count} exceeds remaining file length"
            )));
        }
        let bytes = self.read_raw(count as usize * 2)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Read an `i32`-count-prefixed ID array.
    pub fn read_id_array(&mut self) -> Result<Vec<u32>> {
        let count = self.read_count("id array", 4)?;
        let bytes = self.read_raw(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect())
    }

    /// Read exact number of raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        self.reader.read_exact(&mut bytes)?;
        self.position += length as u64;
        Ok(bytes)
    }

    /// Move to an absolute position.
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        if position > self.file_size {
            return Err(JitenError::format(format!(
                "offset {position} beyond end of file ({} bytes)",
                self.file_size
            )));
        }
        self.reader.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Skip forward over `length` bytes.
    pub fn skip(&mut self, length: u64) -> Result<()> {
        self.seek_to(self.position + length)
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get file size.
    pub fn size(&self) -> u64 {
        self.file_size
    }

    /// Bytes between the current position and the checksum trailer.
    pub fn remaining(&self) -> u64 {
        self.file_size
            .saturating_sub(CHECKSUM_TRAILER_LEN)
            .saturating_sub(self.position)
    }

    /// Close the reader.
    pub fn close(mut self) -> Result<()> {
        self.reader.close()
    }
}

impl<R: StorageInput> Read for StructReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.reader.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

struct CountingReader<'a, R: Read> {
    inner: &'a mut R,
    count: u64,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count += read as u64;
        Ok(read)
    }
}

fn into_io_error(err: JitenError) -> io::Error {
    match err {
        JitenError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

/// Check the CRC32 trailer of a file written by [`StructWriter`].
pub fn verify_checksum(storage: &dyn Storage, name: &str) -> Result<bool> {
    let size = storage.file_size(name)?;
    if size < CHECKSUM_TRAILER_LEN {
        return Err(JitenError::format("File too short for checksum"));
    }

    let mut input = storage.open_input(name)?;
    let mut hasher = Crc32Hasher::new();
    let mut remaining = size - CHECKSUM_TRAILER_LEN;
    let mut buffer = vec![0u8; 64 * 1024];
    while remaining > 0 {
        let chunk = remaining.min(buffer.len() as u64) as usize;
        input.read_exact(&mut buffer[..chunk])?;
        hasher.update(&buffer[..chunk]);
        remaining -= chunk as u64;
    }

    let stored = input.read_u32::<LittleEndian>()?;
    Ok(stored == hasher.finalize())
}
