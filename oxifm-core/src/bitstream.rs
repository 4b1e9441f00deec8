//! Bit-level I/O operations for the index prologue and bucket payloads.
//!
//! This module provides `BitReader` and `BitWriter` for reading and
//! writing data at the bit level, which is essential for the
//! variable-width fields and canonical Huffman codes of the persisted
//! index format.
//!
//! # Bit Ordering
//!
//! The OxiFM on-disk format is MSB-first (Most Significant Bit first):
//! `write_bits(v, n)` appends the low `n` bits of `v` starting from the
//! most significant of those bits, and a canonical Huffman code written
//! this way can be decoded by extending a running value one bit at a
//! time.
//!
//! # Example
//!
//! ```
//! use oxifm_core::bitstream::{BitReader, BitWriter};
//! use std::io::Cursor;
//!
//! let mut output = Vec::new();
//! {
//!     let mut writer = BitWriter::new(&mut output);
//!     writer.write_bits(0b101, 3).unwrap();
//!     writer.write_bits(0b1100, 4).unwrap();
//!     writer.flush().unwrap();
//! }
//!
//! let mut reader = BitReader::new(Cursor::new(&output));
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{OxiFmError, Result};
use std::io::{Read, Write};

/// A bit-level MSB-first reader that wraps any `Read` implementation.
///
/// `BitReader` maintains an internal buffer so codes can cross byte
/// boundaries without extra I/O calls.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    /// Underlying reader.
    reader: R,
    /// Bit buffer; the next bits to deliver sit in the high end of the
    /// low `bits_in_buffer` bits.
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u8,
    /// Total bits read (for error reporting).
    total_bits_read: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new `BitReader` wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Consume this `BitReader` and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Get the total number of bits read so far.
    pub fn bits_read(&self) -> u64 {
        self.total_bits_read
    }

    /// Ensure at least `count` bits are available in the buffer.
    #[inline]
    fn fill_buffer(&mut self, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "Cannot fill more than 32 bits at once");

        while self.bits_in_buffer < count {
            let mut byte = [0u8; 1];
            match self.reader.read(&mut byte) {
                Ok(0) => {
                    return Err(OxiFmError::truncated(
                        (count - self.bits_in_buffer) as u32,
                        self.total_bits_read,
                    ));
                }
                Ok(_) => {
                    self.buffer = (self.buffer << 8) | (byte[0] as u64);
                    self.bits_in_buffer += 8;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Read up to 32 bits from the stream, MSB-first.
    ///
    /// Fails with [`OxiFmError::TruncatedStream`] if fewer bits remain
    /// than requested.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        self.fill_buffer(count)?;

        let shift = self.bits_in_buffer - count;
        let mask = (1u64 << count).wrapping_sub(1);
        let result = ((self.buffer >> shift) & mask) as u32;

        self.bits_in_buffer -= count;
        self.total_bits_read += count as u64;

        Ok(result)
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Align to the next byte boundary by discarding partial bits.
    pub fn align_to_byte(&mut self) {
        let remainder = self.bits_in_buffer % 8;
        if remainder > 0 {
            self.bits_in_buffer -= remainder;
            self.total_bits_read += remainder as u64;
        }
    }

    /// Read bytes directly.
    ///
    /// The bit position must be byte-aligned before calling this method.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(self.bits_in_buffer % 8 == 0, "read_bytes requires alignment");

        // Drain complete bytes still sitting in the bit buffer.
        let mut offset = 0;
        while self.bits_in_buffer >= 8 && offset < buf.len() {
            let shift = self.bits_in_buffer - 8;
            buf[offset] = ((self.buffer >> shift) & 0xFF) as u8;
            self.bits_in_buffer -= 8;
            self.total_bits_read += 8;
            offset += 1;
        }

        if offset < buf.len() {
            self.reader.read_exact(&mut buf[offset..]).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    OxiFmError::truncated(((buf.len() - offset) * 8) as u32, self.total_bits_read)
                } else {
                    e.into()
                }
            })?;
            self.total_bits_read += (buf.len() - offset) as u64 * 8;
        }

        Ok(())
    }
}

/// A bit-level MSB-first writer that wraps any `Write` implementation.
///
/// `BitWriter` accumulates bits in an internal buffer and flushes
/// complete bytes to the underlying writer. Call `flush()` when done to
/// zero-pad and write any remaining partial byte.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    /// Underlying writer.
    writer: W,
    /// Bit buffer; valid bits are the low `bits_in_buffer` bits.
    buffer: u64,
    /// Number of bits in buffer.
    bits_in_buffer: u8,
    /// Total bits written.
    total_bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a new `BitWriter` wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_written: 0,
        }
    }

    /// Flush remaining bits and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }

    /// Get the total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Flush complete bytes from the buffer to the writer.
    #[inline]
    fn flush_bytes(&mut self) -> Result<()> {
        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            let byte = ((self.buffer >> shift) & 0xFF) as u8;
            self.writer.write_all(&[byte])?;
            self.bits_in_buffer -= 8;
        }
        // Drop the flushed high bits so the buffer cannot overflow.
        if self.bits_in_buffer == 0 {
            self.buffer = 0;
        } else {
            self.buffer &= (1u64 << self.bits_in_buffer) - 1;
        }
        Ok(())
    }

    /// Write the low `count` bits of `value` to the stream, MSB-first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");

        if count == 0 {
            return Ok(());
        }

        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count).wrapping_sub(1)
        };
        let value = value & mask;

        self.buffer = (self.buffer << count) | (value as u64);
        self.bits_in_buffer += count;
        self.total_bits_written += count as u64;

        self.flush_bytes()
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(bit as u32, 1)
    }

    /// Pad to a byte boundary with zero bits.
    pub fn align_to_byte(&mut self) -> Result<()> {
        if self.bits_in_buffer % 8 != 0 {
            let padding = 8 - (self.bits_in_buffer % 8);
            self.write_bits(0, padding)?;
        }
        Ok(())
    }

    /// Flush any remaining bits to the underlying writer.
    ///
    /// Partial bits are padded with zeros to complete the final byte.
    pub fn flush(&mut self) -> Result<()> {
        self.align_to_byte()?;
        self.flush_bytes()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write bytes directly to the stream.
    ///
    /// The bit position must be byte-aligned before calling this method.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        debug_assert!(
            self.bits_in_buffer % 8 == 0,
            "write_bytes requires alignment"
        );
        self.flush_bytes()?;
        self.writer.write_all(buf)?;
        self.total_bits_written += buf.len() as u64 * 8;
        Ok(())
    }
}
