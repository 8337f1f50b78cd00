//! LSB-first bit packing.

use std::io::Read;

use byteorder::ReadBytesExt;

use crate::error::Result;

/// Collects bits into bytes, least significant bit first.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bit(&mut self, bit: bool) {
        if bit {
            self.current |= 1 << self.filled;
        }
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    /// Push the low `length` bits of `code`, bit 0 first.
    pub fn push_bits(&mut self, code: u64, length: u32) {
        for i in 0..length {
            self.push_bit((code >> i) & 1 == 1);
        }
    }

    /// Flush a trailing partial byte (zero-padded in the high bits).
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

/// Reads bits from a byte stream, least significant bit first.
///
/// Bytes are pulled from the underlying reader one at a time, only when the
/// next bit is needed.
pub struct BitReader<'a, R: Read> {
    reader: &'a mut R,
    current: u8,
    remaining: u8,
}

impl<'a, R: Read> BitReader<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        BitReader {
            reader,
            current: 0,
            remaining: 0,
        }
    }

    pub fn next_bit(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            self.current = self.reader.read_u8()?;
            self.remaining = 8;
        }
        let bit = self.current & 1 == 1;
        self.current >>= 1;
        self.remaining -= 1;
        Ok(bit)
    }
}
