//! Persisted index format.
//!
//! The prologue is a bit stream (MSB-first) with a fixed header
//! followed by the bucket hierarchy, sized to the text:
//!
//! ```text
//! magic "OXFM"            4 bytes
//! format version          8 bits
//! text length n           2 x 32 bits (high half, low half)
//! level-1 block size      32 bits
//! level-2 block size      32 bits
//! marker frequency        32 bits fixed-point over 65536
//! smalltext flag          8 bits
//! alphabet presence       256 bits
//! ```
//!
//! Small texts follow the header verbatim, byte-aligned. Otherwise the
//! terminator row, the superbucket and bucket records, and the marked
//! row pairs follow, with every row, offset, and count field written in
//! `offset_bits` bits, the smallest whole number of bytes that holds
//! `n + 1`. Derivable quantities are never stored: bucket geometry
//! comes from the block sizes, Huffman table counts from the bucket
//! length, and the symbol cumulative table is recounted on load.

use crate::alphabet::AlphabetMap;
use crate::bucket::{Bucket, CompressedBwt, QueryScratch, Superbucket};
use crate::build::{FmIndex, IndexedRepr, Repr};
use crate::huffman::{HuffGroups, num_groups};
use crate::marks::MarkedRows;
use crate::{FORMAT_VERSION, INDEX_MAGIC, MARKER_FREQ_ONE, ResolvedParams};
use oxifm_core::error::{OxiFmError, Result};
use oxifm_core::{BitReader, BitWriter};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Smallest number of bits (a whole number of bytes) that represents
/// every value up to and including `max`.
fn field_bits(max: u64) -> u8 {
    let bits = (64 - max.leading_zeros()).max(1);
    (bits.div_ceil(8) * 8) as u8
}

/// Write a field wider than the 32-bit single-call limit.
fn write_field<W: Write>(writer: &mut BitWriter<W>, value: u64, bits: u8) -> Result<()> {
    if bits > 32 {
        writer.write_bits((value >> 32) as u32, bits - 32)?;
        writer.write_bits(value as u32, 32)
    } else {
        writer.write_bits(value as u32, bits)
    }
}

fn read_field<R: Read>(reader: &mut BitReader<R>, bits: u8) -> Result<u64> {
    if bits > 32 {
        let high = reader.read_bits(bits - 32)? as u64;
        let low = reader.read_bits(32)? as u64;
        Ok((high << 32) | low)
    } else {
        Ok(reader.read_bits(bits)? as u64)
    }
}

/// Copy an exact number of bits between streams; the payload bytes are
/// MSB-first packed, so whole bytes move as 8-bit fields.
fn write_payload<W: Write>(writer: &mut BitWriter<W>, payload: &[u8], bits: u32) -> Result<()> {
    let full = (bits / 8) as usize;
    for &byte in &payload[..full] {
        writer.write_bits(byte as u32, 8)?;
    }
    let rem = (bits % 8) as u8;
    if rem > 0 {
        writer.write_bits((payload[full] >> (8 - rem)) as u32, rem)?;
    }
    Ok(())
}

fn read_payload<R: Read>(reader: &mut BitReader<R>, bits: u32) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity((bits as usize).div_ceil(8));
    {
        let mut repack = BitWriter::new(&mut payload);
        let mut left = bits;
        while left > 0 {
            let take = left.min(32) as u8;
            repack.write_bits(reader.read_bits(take)?, take)?;
            left -= take as u32;
        }
        repack.flush()?;
    }
    Ok(payload)
}

/// An `io::Write` sink that only counts bytes, for sizing an index
/// without materializing it.
#[derive(Default)]
struct CountingWriter {
    bytes: u64,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FmIndex {
    /// Serialize the index to `writer`.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = BitWriter::new(writer);
        out.write_bytes(&INDEX_MAGIC)?;
        out.write_bits(FORMAT_VERSION as u32, 8)?;
        out.write_bits((self.text_len >> 32) as u32, 32)?;
        out.write_bits(self.text_len as u32, 32)?;
        out.write_bits(self.lev1, 32)?;
        out.write_bits(self.lev2, 32)?;
        out.write_bits(self.marker_freq_fp, 32)?;
        out.write_bits(self.is_smalltext() as u32, 8)?;
        for present in self.alphabet.present() {
            out.write_bit(present)?;
        }

        match &self.repr {
            Repr::Small(text) => {
                out.align_to_byte()?;
                out.write_bytes(text)?;
            }
            Repr::Indexed(idx) => {
                let offset_bits = field_bits(self.text_len + 1);
                write_field(&mut out, idx.eof_row, offset_bits)?;
                write_bwt(&mut out, &idx.bwt, offset_bits)?;
                write_marks(&mut out, &idx.marks, offset_bits)?;
            }
        }

        out.flush()
    }

    /// Serialize the index into a fresh byte vector.
    pub fn save_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.save(&mut buf)?;
        Ok(buf)
    }

    /// Serialize the index to a file at `path`.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(BufWriter::new(File::create(path)?))
    }

    /// Deserialize an index previously written by [`save`](Self::save).
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut input = BitReader::new(reader);

        let mut magic = [0u8; 4];
        input.read_bytes(&mut magic)?;
        if magic != INDEX_MAGIC {
            return Err(OxiFmError::invalid_magic(INDEX_MAGIC, magic));
        }
        let version = input.read_bits(8)? as u8;
        if version != FORMAT_VERSION {
            return Err(OxiFmError::corrupted(
                4,
                format!("unsupported format version {version}"),
            ));
        }

        let high = input.read_bits(32)? as u64;
        let low = input.read_bits(32)? as u64;
        let text_len = (high << 32) | low;
        let lev1 = input.read_bits(32)?;
        let lev2 = input.read_bits(32)?;
        let marker_freq_fp = input.read_bits(32)?;
        let smalltext = input.read_bits(8)? != 0;
        if lev2 == 0 || lev1 == 0 || lev1 % lev2 != 0 {
            return Err(OxiFmError::corrupted(9, "inconsistent block sizes"));
        }
        if marker_freq_fp > MARKER_FREQ_ONE {
            return Err(OxiFmError::corrupted(17, "marker frequency out of range"));
        }

        let mut present = [false; 256];
        for slot in present.iter_mut() {
            *slot = input.read_bit()?;
        }
        let alphabet = AlphabetMap::from_present(&present)?;

        let repr = if smalltext {
            input.align_to_byte();
            // The length field is untrusted; read in bounded chunks so
            // a corrupted header cannot demand a huge upfront
            // allocation before truncation is detected.
            let mut text = Vec::new();
            let mut chunk = [0u8; 8192];
            let mut remaining = text_len;
            while remaining > 0 {
                let take = remaining.min(chunk.len() as u64) as usize;
                input.read_bytes(&mut chunk[..take])?;
                text.extend_from_slice(&chunk[..take]);
                remaining -= take as u64;
            }
            Repr::Small(text)
        } else {
            let offset_bits = field_bits(text_len + 1);
            let rows = text_len + 1;
            let eof_row = read_field(&mut input, offset_bits)?;
            if eof_row >= rows {
                return Err(OxiFmError::corrupted(22, "terminator row out of range"));
            }
            let bwt = read_bwt(
                &mut input,
                rows as usize,
                alphabet.size(),
                lev1 as usize,
                lev2 as usize,
                offset_bits,
            )?;
            let marks = read_marks(&mut input, marker_freq_fp, offset_bits)?;
            let c_table = recount_c_table(&bwt)?;
            Repr::Indexed(IndexedRepr {
                bwt,
                eof_row,
                c_table,
                marks,
            })
        };

        Ok(Self {
            text_len,
            lev1,
            lev2,
            marker_freq_fp,
            alphabet,
            repr,
        })
    }

    /// Deserialize from an in-memory buffer.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::load(bytes)
    }

    /// Deserialize from a file at `path`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(BufReader::new(File::open(path)?))
    }

    /// Serialized size in bytes, computed without materializing the
    /// output.
    pub fn index_size(&self) -> Result<u64> {
        let mut counter = CountingWriter::default();
        self.save(&mut counter)?;
        Ok(counter.bytes)
    }
}

fn write_bwt<W: Write>(
    out: &mut BitWriter<W>,
    bwt: &CompressedBwt,
    offset_bits: u8,
) -> Result<()> {
    let per_sb = bwt.buckets_per_sb();

    for (sb_idx, sb) in bwt.superbuckets.iter().enumerate() {
        for &p in &sb.present {
            out.write_bit(p)?;
        }
        for &count in &sb.prior {
            write_field(out, count, offset_bits)?;
        }

        let b_first = sb_idx * per_sb;
        let b_last = ((sb_idx + 1) * per_sb).min(bwt.buckets.len());
        for b in b_first..b_last {
            let bucket = &bwt.buckets[b];
            // Bucket fields exist only for symbols its superbucket has.
            for (&sp, &bp) in sb.present.iter().zip(&bucket.present) {
                if sp {
                    out.write_bit(bp)?;
                }
            }
            for (&sp, &count) in sb.present.iter().zip(&bucket.prefix) {
                if sp {
                    write_field(out, count, offset_bits)?;
                }
            }

            match &bucket.groups {
                None => {} // single-symbol run, nothing to store
                Some(groups) => {
                    groups.write_tables(out)?;
                    out.write_bits(bucket.payload_bits, 32)?;
                    write_payload(out, &bucket.payload, bucket.payload_bits)?;
                }
            }
        }
    }
    Ok(())
}

fn read_bwt<R: Read>(
    input: &mut BitReader<R>,
    rows: usize,
    sigma: usize,
    lev1: usize,
    lev2: usize,
    offset_bits: u8,
) -> Result<CompressedBwt> {
    let num_sb = rows.div_ceil(lev1);
    let num_b = rows.div_ceil(lev2);
    let per_sb = lev1 / lev2;

    let mut superbuckets = Vec::with_capacity(num_sb);
    let mut buckets = Vec::with_capacity(num_b);

    for sb_idx in 0..num_sb {
        let mut present = vec![false; sigma];
        for slot in present.iter_mut() {
            *slot = input.read_bit()?;
        }
        let mut prior = Vec::with_capacity(sigma);
        for _ in 0..sigma {
            prior.push(read_field(input, offset_bits)?);
        }

        let b_first = sb_idx * per_sb;
        let b_last = ((sb_idx + 1) * per_sb).min(num_b);
        for b in b_first..b_last {
            let mut b_present = vec![false; sigma];
            for (c, slot) in b_present.iter_mut().enumerate() {
                if present[c] {
                    *slot = input.read_bit()?;
                }
            }
            let mut prefix = vec![0u64; sigma];
            for (c, slot) in prefix.iter_mut().enumerate() {
                if present[c] {
                    *slot = read_field(input, offset_bits)?;
                }
            }

            let alpha_size = b_present.iter().filter(|&&p| p).count();
            if alpha_size == 0 {
                return Err(OxiFmError::corrupted(
                    input.bits_read() / 8,
                    "bucket with empty alphabet",
                ));
            }

            let (groups, payload, payload_bits) = if alpha_size == 1 {
                (None, Vec::new(), 0)
            } else {
                let len = lev2.min(rows - b * lev2);
                let groups = HuffGroups::read_tables(input, alpha_size, num_groups(len))?;
                let payload_bits = input.read_bits(32)?;
                let payload = read_payload(input, payload_bits)?;
                (Some(groups), payload, payload_bits)
            };

            buckets.push(Bucket {
                present: b_present,
                prefix,
                groups,
                payload,
                payload_bits,
            });
        }

        superbuckets.push(Superbucket { prior, present });
    }

    Ok(CompressedBwt {
        len: rows,
        sigma,
        lev1,
        lev2,
        superbuckets,
        buckets,
    })
}

fn write_marks<W: Write>(
    out: &mut BitWriter<W>,
    marks: &MarkedRows,
    offset_bits: u8,
) -> Result<()> {
    write_field(out, marks.len() as u64, offset_bits)?;
    for &(row, offset) in marks.pairs() {
        write_field(out, row, offset_bits)?;
        write_field(out, offset, offset_bits)?;
    }
    Ok(())
}

fn read_marks<R: Read>(
    input: &mut BitReader<R>,
    marker_freq_fp: u32,
    offset_bits: u8,
) -> Result<MarkedRows> {
    let count = read_field(input, offset_bits)?;
    let mut pairs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let row = read_field(input, offset_bits)?;
        let offset = read_field(input, offset_bits)?;
        pairs.push((row, offset));
    }
    Ok(MarkedRows::from_pairs(
        ResolvedParams::marker_step(marker_freq_fp),
        pairs,
    ))
}

/// Recount the cumulative symbol table from the persisted bucket
/// counts. Only the final bucket needs decoding.
fn recount_c_table(bwt: &CompressedBwt) -> Result<Vec<u64>> {
    let mut scratch = QueryScratch::default();
    let mut c_table = Vec::with_capacity(bwt.sigma + 1);
    let mut acc = 0u64;
    c_table.push(0);
    for c in 0..bwt.sigma {
        acc += bwt.occ(&mut scratch, c as u8, bwt.len)?;
        c_table.push(acc);
    }
    if acc != bwt.len as u64 {
        return Err(OxiFmError::corrupted(
            0,
            "symbol counts do not cover the transform",
        ));
    }
    Ok(c_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildParams;

    fn indexed_params() -> BuildParams {
        BuildParams::default().with_smalltext_threshold(0)
    }

    fn lcg_text(len: usize, sigma: u8) -> Vec<u8> {
        let mut x: u32 = 123_456_789;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                b'a' + ((x >> 16) % sigma as u32) as u8
            })
            .collect()
    }

    #[test]
    fn test_field_bits() {
        assert_eq!(field_bits(0), 8);
        assert_eq!(field_bits(255), 8);
        assert_eq!(field_bits(256), 16);
        assert_eq!(field_bits(65_536), 24);
        assert_eq!(field_bits(u64::MAX), 64);
    }

    #[test]
    fn test_save_load_indexed() {
        let text = lcg_text(5000, 5);
        let built = FmIndex::build(&text, &indexed_params()).unwrap();
        let bytes = built.save_to_vec().unwrap();
        let loaded = FmIndex::load_from_bytes(&bytes).unwrap();
        assert_eq!(loaded, built);
    }

    #[test]
    fn test_save_load_smalltext() {
        let built = FmIndex::build(b"tiny text", &BuildParams::default()).unwrap();
        let bytes = built.save_to_vec().unwrap();
        let loaded = FmIndex::load_from_bytes(&bytes).unwrap();
        assert_eq!(loaded, built);
        assert!(loaded.is_smalltext());
        assert_eq!(loaded.extract(0, 9).unwrap(), b"tiny text");
    }

    #[test]
    fn test_save_load_empty_text() {
        let built = FmIndex::build(b"", &indexed_params()).unwrap();
        let loaded = FmIndex::load_from_bytes(&built.save_to_vec().unwrap()).unwrap();
        assert_eq!(loaded, built);
        assert_eq!(loaded.count(b"").unwrap(), 1);
    }

    #[test]
    fn test_loaded_index_answers_queries() {
        let text = lcg_text(3000, 3);
        let built = FmIndex::build(&text, &indexed_params()).unwrap();
        let loaded = FmIndex::load_from_bytes(&built.save_to_vec().unwrap()).unwrap();

        let pattern = &text[100..104];
        assert_eq!(loaded.count(pattern).unwrap(), built.count(pattern).unwrap());
        let mut a = built.locate(pattern).unwrap();
        let mut b = loaded.locate(pattern).unwrap();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_eq!(loaded.extract(0, text.len() as u64).unwrap(), text);
    }

    #[test]
    fn test_save_load_path() {
        let text = lcg_text(2000, 4);
        let built = FmIndex::build(&text, &indexed_params()).unwrap();

        let path = std::env::temp_dir().join("oxifm_prologue_test.fm");
        built.save_to_path(&path).unwrap();
        let loaded = FmIndex::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, built);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let err = FmIndex::load_from_bytes(b"NOPE\x01rest").unwrap_err();
        assert!(matches!(err, OxiFmError::InvalidMagic { .. }));
    }

    #[test]
    fn test_bad_version_rejected() {
        let text = lcg_text(1500, 4);
        let mut bytes = FmIndex::build(&text, &indexed_params())
            .unwrap()
            .save_to_vec()
            .unwrap();
        bytes[4] = 0xFE;
        let err = FmIndex::load_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, OxiFmError::CorruptedData { .. }));
    }

    #[test]
    fn test_huge_text_length_field_rejected() {
        // Corrupt the 64-bit text length of a smalltext image to a
        // near-maximal value; the load must fail on truncation instead
        // of attempting a matching allocation.
        let built = FmIndex::build(b"tiny", &BuildParams::default()).unwrap();
        let mut bytes = built.save_to_vec().unwrap();
        for b in &mut bytes[5..13] {
            *b = 0xFF;
        }
        let err = FmIndex::load_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, OxiFmError::TruncatedStream { .. }));
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let text = lcg_text(1500, 4);
        let bytes = FmIndex::build(&text, &indexed_params())
            .unwrap()
            .save_to_vec()
            .unwrap();
        let err = FmIndex::load_from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, OxiFmError::TruncatedStream { .. }));
    }

    #[test]
    fn test_index_size_matches_serialized_length() {
        let text = lcg_text(2000, 4);
        let index = FmIndex::build(&text, &indexed_params()).unwrap();
        let bytes = index.save_to_vec().unwrap();
        assert_eq!(index.index_size().unwrap(), bytes.len() as u64);
    }
}
