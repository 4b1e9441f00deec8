//! Error types for OxiFM operations.
//!
//! This module provides one error type that covers every failure mode of
//! building, persisting, and querying a compressed self-index: I/O
//! errors, parameter validation, and corruption detected while decoding
//! a persisted image.

use std::io;
use thiserror::Error;

/// The main error type for OxiFM operations.
#[derive(Debug, Error)]
pub enum OxiFmError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic number in the index prologue.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// The bit stream ended before the requested bits were available.
    #[error("Truncated stream: {needed_bits} more bits requested at bit position {bit_position}")]
    TruncatedStream {
        /// Number of bits that were requested but not available.
        needed_bits: u32,
        /// Bit position where the shortfall was detected.
        bit_position: u64,
    },

    /// No code length admitted the running value while decoding a
    /// canonical Huffman symbol. Always a fatal corruption signal.
    #[error("Corrupt Huffman table at bit position {bit_position}")]
    CorruptHuffmanTable {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Corrupted data in a persisted index.
    #[error("Corrupted index at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Build parameters outside their accepted ranges.
    #[error("Invalid parameters: {message}")]
    InvalidParameters {
        /// Description of the rejected parameter.
        message: String,
    },

    /// The text uses too many distinct byte values to leave room for
    /// the reserved terminator symbol.
    #[error("Alphabet too large: {distinct} distinct bytes (max 255)")]
    AlphabetTooLarge {
        /// Number of distinct byte values present in the text.
        distinct: usize,
    },

    /// Query pattern longer than the indexed text.
    #[error("Pattern too long: {len} bytes, text is {max} bytes")]
    PatternTooLong {
        /// Pattern length in bytes.
        len: usize,
        /// Maximum accepted pattern length.
        max: usize,
    },

    /// Extract range outside the indexed text.
    #[error("Range out of bounds: start {start} + len {len} exceeds text length {text_len}")]
    RangeError {
        /// Requested start offset.
        start: u64,
        /// Requested length.
        len: u64,
        /// Length of the indexed text.
        text_len: u64,
    },
}

/// Result type alias for OxiFM operations.
pub type Result<T> = std::result::Result<T, OxiFmError>;

impl OxiFmError {
    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a truncated stream error.
    pub fn truncated(needed_bits: u32, bit_position: u64) -> Self {
        Self::TruncatedStream {
            needed_bits,
            bit_position,
        }
    }

    /// Create a corrupt Huffman table error.
    pub fn corrupt_huffman(bit_position: u64) -> Self {
        Self::CorruptHuffmanTable { bit_position }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid parameters error.
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create an alphabet too large error.
    pub fn alphabet_too_large(distinct: usize) -> Self {
        Self::AlphabetTooLarge { distinct }
    }

    /// Create a pattern too long error.
    pub fn pattern_too_long(len: usize, max: usize) -> Self {
        Self::PatternTooLong { len, max }
    }

    /// Create a range error.
    pub fn range_error(start: u64, len: u64, text_len: u64) -> Self {
        Self::RangeError {
            start,
            len,
            text_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiFmError::invalid_magic(vec![0x4F, 0x58], vec![0x42, 0x5A]);
        assert!(err.to_string().contains("Invalid magic"));

        let err = OxiFmError::truncated(8, 123);
        assert!(err.to_string().contains("Truncated stream"));

        let err = OxiFmError::pattern_too_long(100, 12);
        assert!(err.to_string().contains("Pattern too long"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OxiFmError = io_err.into();
        assert!(matches!(err, OxiFmError::Io(_)));
    }
}
