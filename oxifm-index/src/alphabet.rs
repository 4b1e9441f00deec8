//! Dense alphabet remapping.
//!
//! The index operates on a dense alphabet: every byte value actually
//! present in the text is mapped to `1..=sigma` in ascending byte
//! order, and dense symbol 0 is reserved for the implicit end-of-text
//! terminator. The dense size (terminator included) must fit in a
//! byte, so a text using all 256 byte values is rejected.

use oxifm_core::error::{OxiFmError, Result};

/// Reserved dense symbol for the end-of-text terminator.
pub const TERMINATOR: u8 = 0;

/// Two-way map between the text's sparse byte alphabet and the dense
/// symbol space used by the BWT machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphabetMap {
    /// original byte -> dense symbol, 0 meaning "absent".
    to_dense: [u8; 256],
    /// dense symbol -> original byte; entry 0 is the terminator slot.
    from_dense: Vec<u8>,
}

impl AlphabetMap {
    /// Build the map from the bytes present in `text`.
    pub fn from_text(text: &[u8]) -> Result<Self> {
        let mut present = [false; 256];
        for &b in text {
            present[b as usize] = true;
        }
        Self::from_present(&present)
    }

    /// Build the map from a 256-entry presence table.
    pub fn from_present(present: &[bool; 256]) -> Result<Self> {
        let distinct = present.iter().filter(|&&p| p).count();
        if distinct > 255 {
            return Err(OxiFmError::alphabet_too_large(distinct));
        }

        let mut to_dense = [0u8; 256];
        let mut from_dense = Vec::with_capacity(distinct + 1);
        from_dense.push(0); // terminator slot
        for (byte, &p) in present.iter().enumerate() {
            if p {
                to_dense[byte] = from_dense.len() as u8;
                from_dense.push(byte as u8);
            }
        }

        Ok(Self {
            to_dense,
            from_dense,
        })
    }

    /// Dense alphabet size, terminator included.
    pub fn size(&self) -> usize {
        self.from_dense.len()
    }

    /// Map an original byte to its dense symbol, or `None` if the byte
    /// does not occur in the indexed text.
    #[inline]
    pub fn encode(&self, byte: u8) -> Option<u8> {
        match self.to_dense[byte as usize] {
            0 => None,
            dense => Some(dense),
        }
    }

    /// Map a dense symbol back to its original byte.
    ///
    /// The terminator (dense 0) has no original byte; callers never ask
    /// for it on a consistent index.
    #[inline]
    pub fn decode(&self, dense: u8) -> u8 {
        self.from_dense[dense as usize]
    }

    /// Remap a whole text into dense symbols.
    pub fn encode_text(&self, text: &[u8]) -> Vec<u8> {
        text.iter().map(|&b| self.to_dense[b as usize]).collect()
    }

    /// Remap a pattern; `None` when some byte is absent from the
    /// alphabet (the pattern then cannot occur in the text).
    pub fn encode_pattern(&self, pattern: &[u8]) -> Option<Vec<u8>> {
        pattern.iter().map(|&b| self.encode(b)).collect()
    }

    /// The 256-entry presence table (for serialization).
    pub fn present(&self) -> [bool; 256] {
        let mut present = [false; 256];
        for &byte in &self.from_dense[1..] {
            present[byte as usize] = true;
        }
        present
    }
}
