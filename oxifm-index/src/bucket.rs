//! Two-level bucket hierarchy over the BWT string.
//!
//! The BWT is partitioned into level-1 "superbuckets" and nested
//! level-2 buckets. A superbucket stores per-symbol counts over all
//! prior superbuckets; a bucket stores per-symbol counts over the
//! prior buckets of its own superbucket plus its MTF+Huffman compressed
//! payload. Each bucket decodes independently, which bounds query work
//! to the buckets actually touched.

use crate::huffman::HuffGroups;
use crate::mtf;
use oxifm_core::error::{OxiFmError, Result};
use oxifm_core::{BitReader, BitWriter};
use std::io::Cursor;

/// Level-1 bucket: cumulative counts over all prior superbuckets and a
/// presence bitmap for its own range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superbucket {
    /// `prior[c]` = occurrences of dense symbol `c` before this
    /// superbucket's range. Deliberately excludes the range itself.
    pub prior: Vec<u64>,
    /// Which dense symbols occur within this superbucket.
    pub present: Vec<bool>,
}

/// Level-2 bucket: presence bitmap, counts relative to the superbucket
/// start, and the compressed payload with its code tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Which dense symbols occur within this bucket.
    pub present: Vec<bool>,
    /// `prefix[c]` = occurrences of `c` in the prior buckets of the
    /// same superbucket.
    pub prefix: Vec<u64>,
    /// Huffman group tables; `None` for the single-symbol escape.
    pub groups: Option<HuffGroups>,
    /// Compressed MTF-rank payload, zero-padded to a byte boundary.
    pub payload: Vec<u8>,
    /// Exact payload length in bits.
    pub payload_bits: u32,
}

impl Bucket {
    /// Bucket alphabet: present symbols in ascending dense order.
    pub fn alphabet(&self) -> Vec<u8> {
        self.present
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p)
            .map(|(c, _)| c as u8)
            .collect()
    }
}

/// The compressed BWT string: bucket hierarchy plus geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBwt {
    /// Number of BWT rows (text length + 1).
    pub len: usize,
    /// Dense alphabet size, terminator included.
    pub sigma: usize,
    /// Level-1 block size in bytes.
    pub lev1: usize,
    /// Level-2 block size in bytes.
    pub lev2: usize,
    /// Superbucket records, in BWT order.
    pub superbuckets: Vec<Superbucket>,
    /// Bucket records, in BWT order.
    pub buckets: Vec<Bucket>,
}

/// Per-query scratch state: a one-slot decoded-bucket cache.
///
/// Kept outside the index so concurrent queries against separate
/// scratch objects never share mutable state.
#[derive(Debug, Default)]
pub struct QueryScratch {
    cached: Option<(usize, Vec<u8>)>,
}

impl QueryScratch {
    /// Decoded symbols of bucket `b`, decoding on a cache miss.
    pub fn bucket<'a>(&'a mut self, bwt: &CompressedBwt, b: usize) -> Result<&'a [u8]> {
        let hit = matches!(self.cached, Some((idx, _)) if idx == b);
        if !hit {
            let data = bwt.decode_bucket(b)?;
            self.cached = Some((b, data));
        }
        match &self.cached {
            Some((_, data)) => Ok(data),
            None => unreachable!("cache filled above"),
        }
    }
}

impl CompressedBwt {
    /// Build the hierarchy from a dense-symbol BWT string.
    ///
    /// `lev1` must be a multiple of `lev2`; both are the resolved
    /// (rounded) block sizes.
    pub fn build(bwt: &[u8], sigma: usize, lev1: usize, lev2: usize) -> Result<Self> {
        debug_assert!(lev1 % lev2 == 0);
        let m = bwt.len();
        let num_sb = m.div_ceil(lev1);
        let num_b = m.div_ceil(lev2);

        let mut superbuckets = Vec::with_capacity(num_sb);
        let mut buckets = Vec::with_capacity(num_b);
        let mut running = vec![0u64; sigma];

        for sb_idx in 0..num_sb {
            let sb_start = sb_idx * lev1;
            let sb_end = (sb_start + lev1).min(m);
            let sb_slice = &bwt[sb_start..sb_end];

            let mut present = vec![false; sigma];
            for &c in sb_slice {
                present[c as usize] = true;
            }
            superbuckets.push(Superbucket {
                prior: running.clone(),
                present,
            });

            let mut sb_counts = vec![0u64; sigma];
            let mut b_start = sb_start;
            while b_start < sb_end {
                let b_end = (b_start + lev2).min(sb_end);
                let slice = &bwt[b_start..b_end];
                buckets.push(compress_bucket(slice, sigma, &sb_counts)?);
                for &c in slice {
                    sb_counts[c as usize] += 1;
                }
                b_start = b_end;
            }

            for (r, &c) in running.iter_mut().zip(sb_counts.iter()) {
                *r += c;
            }
        }

        Ok(Self {
            len: m,
            sigma,
            lev1,
            lev2,
            superbuckets,
            buckets,
        })
    }

    /// Length in symbols of bucket `b` (the last bucket may be short).
    pub fn bucket_len(&self, b: usize) -> usize {
        self.lev2.min(self.len - b * self.lev2)
    }

    /// Buckets per full superbucket.
    pub fn buckets_per_sb(&self) -> usize {
        self.lev1 / self.lev2
    }

    /// Decompress bucket `b` back into dense symbols.
    pub fn decode_bucket(&self, b: usize) -> Result<Vec<u8>> {
        let len = self.bucket_len(b);
        let bucket = &self.buckets[b];
        let alphabet = bucket.alphabet();

        if alphabet.len() == 1 {
            // Single-symbol escape: the payload is an implicit run.
            return Ok(vec![alphabet[0]; len]);
        }

        let groups = bucket.groups.as_ref().ok_or_else(|| {
            OxiFmError::corrupted(0, "multi-symbol bucket without Huffman tables")
        })?;
        let mut reader = BitReader::new(Cursor::new(bucket.payload.as_slice()));
        let ranks = groups.decode_payload(&mut reader, len)?;
        Ok(mtf::decode(&ranks, &alphabet))
    }

    /// Occurrences of dense symbol `c` in `bwt[0..pos)`.
    ///
    /// Superbucket count + bucket prefix count + a scan of the one
    /// decoded bucket the position falls in.
    pub fn occ(&self, scratch: &mut QueryScratch, c: u8, pos: usize) -> Result<u64> {
        if pos == 0 {
            return Ok(0);
        }
        let last = pos - 1;
        let sb = last / self.lev1;
        let b = last / self.lev2;

        let sbr = &self.superbuckets[sb];
        let base = sbr.prior[c as usize];
        if !sbr.present[c as usize] {
            return Ok(base);
        }

        let bucket = &self.buckets[b];
        let base = base + bucket.prefix[c as usize];
        if !bucket.present[c as usize] {
            return Ok(base);
        }

        let b_start = b * self.lev2;
        let data = scratch.bucket(self, b)?;
        let within = data[..pos - b_start].iter().filter(|&&s| s == c).count();
        Ok(base + within as u64)
    }

    /// The dense symbol at BWT position `pos`.
    pub fn symbol_at(&self, scratch: &mut QueryScratch, pos: usize) -> Result<u8> {
        let b = pos / self.lev2;
        let data = scratch.bucket(self, b)?;
        Ok(data[pos - b * self.lev2])
    }

    /// Position of the zero-based `k`-th occurrence of `c`, i.e. the
    /// row `r` with `occ(c, r) == k` and `bwt[r] == c`.
    ///
    /// The caller guarantees `k` is below the total count of `c`.
    pub fn select(&self, scratch: &mut QueryScratch, c: u8, k: u64) -> Result<usize> {
        // Last superbucket whose prior count does not exceed k.
        let sb = self
            .superbuckets
            .partition_point(|s| s.prior[c as usize] <= k)
            - 1;
        let rel = k - self.superbuckets[sb].prior[c as usize];

        let b_first = sb * self.buckets_per_sb();
        let b_last = ((sb + 1) * self.buckets_per_sb()).min(self.buckets.len());
        let off = self.buckets[b_first..b_last].partition_point(|bk| bk.prefix[c as usize] <= rel);
        let b = b_first + off - 1;
        let mut within = rel - self.buckets[b].prefix[c as usize];

        let data = scratch.bucket(self, b)?;
        for (i, &s) in data.iter().enumerate() {
            if s == c {
                if within == 0 {
                    return Ok(b * self.lev2 + i);
                }
                within -= 1;
            }
        }

        Err(OxiFmError::corrupted(
            0,
            "occurrence counts inconsistent with bucket payload",
        ))
    }
}

/// MTF + grouped-Huffman compress one bucket range.
fn compress_bucket(slice: &[u8], sigma: usize, sb_counts: &[u64]) -> Result<Bucket> {
    let mut present = vec![false; sigma];
    for &c in slice {
        present[c as usize] = true;
    }
    let alphabet: Vec<u8> = present
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p)
        .map(|(c, _)| c as u8)
        .collect();

    if alphabet.len() == 1 {
        return Ok(Bucket {
            present,
            prefix: sb_counts.to_vec(),
            groups: None,
            payload: Vec::new(),
            payload_bits: 0,
        });
    }

    let ranks = mtf::encode(slice, &alphabet);
    let groups = HuffGroups::build(&ranks, alphabet.len())?;

    let mut payload = Vec::new();
    let payload_bits;
    {
        let mut writer = BitWriter::new(&mut payload);
        groups.encode_payload(&mut writer, &ranks)?;
        payload_bits = writer.bits_written() as u32;
        writer.flush()?;
    }

    Ok(Bucket {
        present,
        prefix: sb_counts.to_vec(),
        groups: Some(groups),
        payload,
        payload_bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_symbols(len: usize, sigma: u8) -> Vec<u8> {
        let mut x: u32 = 987_654_321;
        let mut v = Vec::with_capacity(len);
        for _ in 0..len {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            v.push(((x >> 16) % sigma as u32) as u8);
        }
        v
    }

    fn naive_occ(bwt: &[u8], c: u8, pos: usize) -> u64 {
        bwt[..pos].iter().filter(|&&s| s == c).count() as u64
    }

    #[test]
    fn test_bucket_roundtrip() {
        let bwt = lcg_symbols(3000, 5);
        let cb = CompressedBwt::build(&bwt, 5, 1024, 256).unwrap();

        let mut decoded = Vec::new();
        for b in 0..cb.buckets.len() {
            decoded.extend(cb.decode_bucket(b).unwrap());
        }
        assert_eq!(decoded, bwt);
    }

    #[test]
    fn test_occ_matches_naive() {
        let bwt = lcg_symbols(2500, 4);
        let cb = CompressedBwt::build(&bwt, 4, 512, 256).unwrap();
        let mut scratch = QueryScratch::default();

        for pos in [0, 1, 255, 256, 257, 511, 1000, 2499, 2500] {
            for c in 0..4u8 {
                assert_eq!(
                    cb.occ(&mut scratch, c, pos).unwrap(),
                    naive_occ(&bwt, c, pos),
                    "c={c} pos={pos}"
                );
            }
        }
    }

    #[test]
    fn test_symbol_at() {
        let bwt = lcg_symbols(700, 3);
        let cb = CompressedBwt::build(&bwt, 3, 512, 256).unwrap();
        let mut scratch = QueryScratch::default();
        for pos in [0, 1, 255, 256, 511, 699] {
            assert_eq!(cb.symbol_at(&mut scratch, pos).unwrap(), bwt[pos]);
        }
    }

    #[test]
    fn test_select_inverts_occ() {
        let bwt = lcg_symbols(2000, 4);
        let cb = CompressedBwt::build(&bwt, 4, 1024, 256).unwrap();
        let mut scratch = QueryScratch::default();

        for c in 0..4u8 {
            let total = naive_occ(&bwt, c, bwt.len());
            for k in [0, 1, total / 2, total - 1] {
                let pos = cb.select(&mut scratch, c, k).unwrap();
                assert_eq!(bwt[pos], c);
                assert_eq!(naive_occ(&bwt, c, pos), k);
            }
        }
    }

    #[test]
    fn test_single_symbol_bucket_has_no_tables() {
        // All-same range: every bucket takes the implicit-run path.
        let bwt = vec![2u8; 600];
        let cb = CompressedBwt::build(&bwt, 3, 512, 256).unwrap();
        assert!(cb.buckets.iter().all(|b| b.groups.is_none()));
        assert!(cb.buckets.iter().all(|b| b.payload.is_empty()));
        assert_eq!(cb.decode_bucket(0).unwrap(), vec![2u8; 256]);

        let mut scratch = QueryScratch::default();
        assert_eq!(cb.occ(&mut scratch, 2, 600).unwrap(), 600);
        assert_eq!(cb.occ(&mut scratch, 1, 600).unwrap(), 0);
    }
}
