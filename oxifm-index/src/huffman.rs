//! Grouped canonical Huffman coding for bucket payloads.
//!
//! Each bucket's MTF-rank stream is entropy coded with up to
//! [`MAX_GROUPS`] canonical tables: the stream is cut into
//! [`GROUP_SIZE`]-symbol chunks and chunk `i` uses table
//! `i % num_tables`, with the table count derived from the (known)
//! bucket length, so no selector stream is persisted. Code lengths are
//! limited to [`MAX_CODE_LEN`] bits by repeated frequency halving, and
//! tables are persisted as delta-coded code lengths.

use oxifm_core::error::{OxiFmError, Result};
use oxifm_core::{BitReader, BitWriter};
use std::collections::BinaryHeap;
use std::io::{Read, Write};

/// Maximum code length in bits.
pub const MAX_CODE_LEN: usize = 23;

/// Maximum number of interleaved code tables per bucket.
pub const MAX_GROUPS: usize = 6;

/// Symbols per table-switch chunk.
pub const GROUP_SIZE: usize = 50;

/// Number of tables used for a payload of `len` symbols.
///
/// Deterministic in `len`, so the decoder derives it instead of
/// reading it.
pub fn num_groups(len: usize) -> usize {
    (len / GROUP_SIZE).clamp(1, MAX_GROUPS)
}

/// Unrestricted Huffman code lengths from positive frequencies.
fn huffman_lengths(freqs: &[u64]) -> Vec<u8> {
    let n = freqs.len();
    debug_assert!(n >= 2);

    // Min-heap of (frequency, node id); leaf ids are 0..n, internal
    // nodes are appended after them. Tie-breaking on the id keeps the
    // tree deterministic.
    let mut heap: BinaryHeap<std::cmp::Reverse<(u64, u32)>> = freqs
        .iter()
        .enumerate()
        .map(|(i, &f)| std::cmp::Reverse((f, i as u32)))
        .collect();

    let mut parent = vec![u32::MAX; 2 * n - 1];
    let mut next_id = n as u32;

    while heap.len() > 1 {
        let std::cmp::Reverse((fa, a)) = heap.pop().expect("heap has >1 elements");
        let std::cmp::Reverse((fb, b)) = heap.pop().expect("heap has >1 elements");
        parent[a as usize] = next_id;
        parent[b as usize] = next_id;
        heap.push(std::cmp::Reverse((fa + fb, next_id)));
        next_id += 1;
    }

    let root = next_id - 1;
    let mut lengths = vec![0u8; n];
    for (i, len) in lengths.iter_mut().enumerate() {
        let mut node = i as u32;
        while node != root {
            node = parent[node as usize];
            *len += 1;
        }
    }
    lengths
}

/// Build code lengths bounded by [`MAX_CODE_LEN`].
///
/// Zero frequencies are bumped to one so every symbol stays decodable;
/// when the unrestricted tree exceeds the bound, frequencies are halved
/// (`f/2 + 1`) and the tree rebuilt until it fits.
pub fn build_code_lengths(freqs: &[u32]) -> Vec<u8> {
    let n = freqs.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1];
    }

    let mut f: Vec<u64> = freqs.iter().map(|&x| x.max(1) as u64).collect();
    loop {
        let lengths = huffman_lengths(&f);
        let max = *lengths.iter().max().expect("non-empty lengths");
        if max as usize <= MAX_CODE_LEN {
            return lengths;
        }
        for x in f.iter_mut() {
            *x = *x / 2 + 1;
        }
    }
}

/// One canonical Huffman table: encode codes plus the
/// limit/base/permutation decode arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTable {
    /// Code lengths for each symbol.
    pub lengths: Vec<u8>,
    /// Canonical codes for each symbol (for encoding).
    codes: Vec<u32>,
    /// Minimum code length.
    min_len: u8,
    /// Maximum code length.
    max_len: u8,
    /// First canonical code of each length.
    bases: [u32; MAX_CODE_LEN + 1],
    /// Last canonical code of each length.
    limits: [u32; MAX_CODE_LEN + 1],
    /// Symbol count at each length; a length with no codes never
    /// terminates a decode.
    counts: [u32; MAX_CODE_LEN + 1],
    /// Index in `perms` where each length's symbols start.
    base_index: [u32; MAX_CODE_LEN + 1],
    /// Permutation mapping decode rank to symbol.
    perms: Vec<u8>,
}

impl CanonicalTable {
    /// Create a table from code lengths.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        if lengths.is_empty() {
            return Err(OxiFmError::corrupted(0, "empty Huffman table"));
        }

        let min_len = *lengths.iter().filter(|&&l| l > 0).min().unwrap_or(&1);
        let max_len = *lengths.iter().max().unwrap_or(&1);
        if max_len as usize > MAX_CODE_LEN {
            return Err(OxiFmError::corrupted(0, "Huffman code length too long"));
        }

        let mut counts = [0u32; MAX_CODE_LEN + 1];
        for &len in lengths {
            if len > 0 {
                counts[len as usize] += 1;
            }
        }

        // Canonical layout: codes of equal length are consecutive
        // integers in symbol order, each length starting at the
        // previous length's end shifted left one bit.
        let mut bases = [0u32; MAX_CODE_LEN + 1];
        let mut limits = [0u32; MAX_CODE_LEN + 1];
        let mut base_index = [0u32; MAX_CODE_LEN + 1];
        let mut code = 0u32;
        let mut index = 0u32;
        for len in 1..=max_len as usize {
            bases[len] = code;
            base_index[len] = index;
            let count = counts[len];
            limits[len] = if count > 0 { code + count - 1 } else { code };
            code = (code + count) << 1;
            index += count;
        }

        let mut codes = vec![0u32; lengths.len()];
        let mut next_code = bases;
        for (sym, &len) in lengths.iter().enumerate() {
            if len > 0 {
                codes[sym] = next_code[len as usize];
                next_code[len as usize] += 1;
            }
        }

        let total_symbols = lengths.iter().filter(|&&l| l > 0).count();
        let mut perms = vec![0u8; total_symbols];
        let mut perm_idx = base_index;
        for (sym, &len) in lengths.iter().enumerate() {
            if len > 0 {
                perms[perm_idx[len as usize] as usize] = sym as u8;
                perm_idx[len as usize] += 1;
            }
        }

        Ok(Self {
            lengths: lengths.to_vec(),
            codes,
            min_len,
            max_len,
            bases,
            limits,
            counts,
            base_index,
            perms,
        })
    }

    /// Write the canonical code of `sym`, MSB-first.
    #[inline]
    pub fn encode<W: Write>(&self, writer: &mut BitWriter<W>, sym: u8) -> Result<()> {
        let len = self.lengths[sym as usize];
        debug_assert!(len > 0, "encoding a symbol without a code");
        writer.write_bits(self.codes[sym as usize], len)
    }

    /// Decode a single symbol by extending a running code one bit at a
    /// time and stopping at the first length whose limit admits it.
    pub fn decode<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u8> {
        let mut code = reader.read_bits(self.min_len)?;

        for len in self.min_len..=self.max_len {
            let len_idx = len as usize;
            if self.counts[len_idx] > 0 && code <= self.limits[len_idx] {
                let rank = self.base_index[len_idx] + (code - self.bases[len_idx]);
                return Ok(self.perms[rank as usize]);
            }
            code = (code << 1) | reader.read_bits(1)?;
        }

        Err(OxiFmError::corrupt_huffman(reader.bits_read()))
    }
}

/// The interleaved table group covering one bucket payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffGroups {
    tables: Vec<CanonicalTable>,
}

impl HuffGroups {
    /// Build the group tables from a bucket's MTF-rank stream.
    ///
    /// `alpha_size` is the bucket alphabet size; ranks are always in
    /// `0..alpha_size`.
    pub fn build(ranks: &[u8], alpha_size: usize) -> Result<Self> {
        let num = num_groups(ranks.len());
        let mut freqs = vec![vec![0u32; alpha_size]; num];
        for (chunk_idx, chunk) in ranks.chunks(GROUP_SIZE).enumerate() {
            let table = chunk_idx % num;
            for &r in chunk {
                freqs[table][r as usize] += 1;
            }
        }

        let tables = freqs
            .iter()
            .map(|f| CanonicalTable::from_lengths(&build_code_lengths(f)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tables })
    }

    /// Number of tables in the group.
    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    /// Huffman-code the rank stream.
    pub fn encode_payload<W: Write>(&self, writer: &mut BitWriter<W>, ranks: &[u8]) -> Result<()> {
        let num = self.tables.len();
        for (chunk_idx, chunk) in ranks.chunks(GROUP_SIZE).enumerate() {
            let table = &self.tables[chunk_idx % num];
            for &r in chunk {
                table.encode(writer, r)?;
            }
        }
        Ok(())
    }

    /// Decode `len` ranks from the payload bit stream.
    pub fn decode_payload<R: Read>(&self, reader: &mut BitReader<R>, len: usize) -> Result<Vec<u8>> {
        let num = self.tables.len();
        let mut ranks = Vec::with_capacity(len);
        let mut chunk_idx = 0;
        while ranks.len() < len {
            let table = &self.tables[chunk_idx % num];
            let chunk_end = (ranks.len() + GROUP_SIZE).min(len);
            while ranks.len() < chunk_end {
                ranks.push(table.decode(reader)?);
            }
            chunk_idx += 1;
        }
        Ok(ranks)
    }

    /// Persist the tables as delta-coded code lengths: a 5-bit starting
    /// length, then adjust bits per symbol.
    pub fn write_tables<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        for table in &self.tables {
            let start = table.lengths.first().copied().unwrap_or(1);
            writer.write_bits(start as u32, 5)?;

            let mut current = start as i32;
            for &len in &table.lengths {
                let target = len as i32;
                while current != target {
                    writer.write_bit(true)?;
                    if target > current {
                        writer.write_bit(false)?;
                        current += 1;
                    } else {
                        writer.write_bit(true)?;
                        current -= 1;
                    }
                }
                writer.write_bit(false)?;
            }
        }
        Ok(())
    }

    /// Read back tables written by [`Self::write_tables`].
    pub fn read_tables<R: Read>(
        reader: &mut BitReader<R>,
        alpha_size: usize,
        num_tables: usize,
    ) -> Result<Self> {
        let mut tables = Vec::with_capacity(num_tables);
        for _ in 0..num_tables {
            let start = reader.read_bits(5)? as i32;
            let mut current = start;
            let mut lengths = Vec::with_capacity(alpha_size);
            for _ in 0..alpha_size {
                while reader.read_bit()? {
                    if reader.read_bit()? {
                        current -= 1;
                    } else {
                        current += 1;
                    }
                }
                if current < 1 || current as usize > MAX_CODE_LEN {
                    return Err(OxiFmError::corrupted(
                        reader.bits_read() / 8,
                        "Huffman code length out of range",
                    ));
                }
                lengths.push(current as u8);
            }
            tables.push(CanonicalTable::from_lengths(&lengths)?);
        }
        Ok(Self { tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_code_lengths_shorter_for_frequent_symbols() {
        let lengths = build_code_lengths(&[100, 50, 25, 10]);
        assert_eq!(lengths.len(), 4);
        assert!(lengths[0] <= lengths[3]);
    }

    #[test]
    fn test_code_lengths_kraft_equality() {
        for freqs in [
            vec![1u32, 1],
            vec![5, 1, 1, 1],
            vec![100, 1, 1, 1, 1, 1, 1, 90],
        ] {
            let lengths = build_code_lengths(&freqs);
            let kraft: u64 = lengths
                .iter()
                .map(|&l| 1u64 << (MAX_CODE_LEN - l as usize))
                .sum();
            assert_eq!(kraft, 1u64 << MAX_CODE_LEN, "freqs {freqs:?}");
        }
    }

    #[test]
    fn test_code_lengths_respect_bound() {
        // Fibonacci-ish frequencies force deep trees.
        let mut freqs = vec![1u32, 1];
        for i in 2..40 {
            let next = freqs[i - 1].saturating_add(freqs[i - 2]);
            freqs.push(next);
        }
        let lengths = build_code_lengths(&freqs);
        assert!(lengths.iter().all(|&l| (1..=MAX_CODE_LEN as u8).contains(&l)));
    }

    #[test]
    fn test_canonical_decode_with_length_gap() {
        // Lengths 1,3,3,3,3 have no length-2 codes; the decoder must
        // not stop at the empty length class.
        let lengths = [1u8, 3, 3, 3, 3];
        let table = CanonicalTable::from_lengths(&lengths).unwrap();

        let mut buf = Vec::new();
        {
            let mut writer = BitWriter::new(&mut buf);
            for sym in [0u8, 4, 1, 3, 2, 0] {
                table.encode(&mut writer, sym).unwrap();
            }
            writer.flush().unwrap();
        }

        let mut reader = BitReader::new(Cursor::new(&buf));
        for expected in [0u8, 4, 1, 3, 2, 0] {
            assert_eq!(table.decode(&mut reader).unwrap(), expected);
        }
    }

    #[test]
    fn test_invalid_code_is_corruption() {
        // Only codes 0 and 1 exist at length 1; a depleted stream of
        // one-bits cannot be stretched past max_len.
        let table = CanonicalTable::from_lengths(&[2, 2, 2]).unwrap();
        let data = vec![0xFF; 4];
        let mut reader = BitReader::new(Cursor::new(data));
        let err = table.decode(&mut reader).unwrap_err();
        assert!(matches!(err, OxiFmError::CorruptHuffmanTable { .. }));
    }

    #[test]
    fn test_groups_payload_roundtrip() {
        // 180 symbols -> 3 tables, chunks rotate between them.
        let alpha = 5usize;
        let mut x: u32 = 42;
        let ranks: Vec<u8> = (0..180)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((x >> 16) % alpha as u32) as u8
            })
            .collect();
        assert_eq!(num_groups(ranks.len()), 3);

        let groups = HuffGroups::build(&ranks, alpha).unwrap();
        let mut buf = Vec::new();
        {
            let mut writer = BitWriter::new(&mut buf);
            groups.write_tables(&mut writer).unwrap();
            groups.encode_payload(&mut writer, &ranks).unwrap();
            writer.flush().unwrap();
        }

        let mut reader = BitReader::new(Cursor::new(&buf));
        let loaded = HuffGroups::read_tables(&mut reader, alpha, groups.num_tables()).unwrap();
        assert_eq!(loaded, groups);
        let decoded = loaded.decode_payload(&mut reader, ranks.len()).unwrap();
        assert_eq!(decoded, ranks);
    }

    #[test]
    fn test_num_groups_policy() {
        assert_eq!(num_groups(0), 1);
        assert_eq!(num_groups(49), 1);
        assert_eq!(num_groups(100), 2);
        assert_eq!(num_groups(10_000), MAX_GROUPS);
    }
}
