//! Index construction.
//!
//! `FmIndex::build` runs the whole pipeline: alphabet remap, suffix
//! sort, BWT, bucket hierarchy, marked-row sampling. There is no
//! partially built state: `build` either returns a fully valid index
//! or an error.

use crate::alphabet::{AlphabetMap, TERMINATOR};
use crate::bucket::CompressedBwt;
use crate::marks::MarkedRows;
use crate::suffix::{build_suffix_array, bwt_from_sa};
use crate::{BuildParams, MARKER_FREQ_ONE, ResolvedParams};
use oxifm_core::error::Result;

/// A compressed full-text self-index over a byte sequence.
///
/// Built once from a text, then queried with
/// [`count`](FmIndex::count), [`locate`](FmIndex::locate), and
/// [`extract`](FmIndex::extract); persisted with
/// [`save`](FmIndex::save) / [`load`](FmIndex::load). The original
/// text is not retained (except on the small-text escape path, where
/// storing it verbatim is the representation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmIndex {
    /// Original text length in bytes.
    pub(crate) text_len: u64,
    /// Effective level-1 block size in bytes.
    pub(crate) lev1: u32,
    /// Effective level-2 block size in bytes.
    pub(crate) lev2: u32,
    /// Marker frequency as a fixed-point fraction of `MARKER_FREQ_ONE`.
    pub(crate) marker_freq_fp: u32,
    /// Dense alphabet maps.
    pub(crate) alphabet: AlphabetMap,
    /// Indexed or small-text representation.
    pub(crate) repr: Repr,
}

/// Index representation: the bucket hierarchy, or the raw text for
/// inputs below the small-text threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Repr {
    /// Raw text stored unindexed; queries go through Boyer-Moore.
    Small(Vec<u8>),
    /// Full BWT-based representation.
    Indexed(IndexedRepr),
}

/// The BWT-based representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexedRepr {
    /// Compressed BWT string (dense symbols, terminator included).
    pub bwt: CompressedBwt,
    /// Row whose suffix starts at text offset 0 (the row carrying the
    /// terminator symbol in the BWT).
    pub eof_row: u64,
    /// `c_table[c]` = number of BWT symbols lexicographically smaller
    /// than dense symbol `c`; `c_table[sigma]` = number of rows.
    pub c_table: Vec<u64>,
    /// Sampled row -> offset table.
    pub marks: MarkedRows,
}

impl FmIndex {
    /// Build an index over `text`.
    ///
    /// Parameters are validated and rounded before any allocation;
    /// see [`BuildParams`].
    pub fn build(text: &[u8], params: &BuildParams) -> Result<Self> {
        let resolved = params.resolve()?;
        let alphabet = AlphabetMap::from_text(text)?;

        if text.len() < params.smalltext_threshold {
            return Ok(Self {
                text_len: text.len() as u64,
                lev1: resolved.lev1,
                lev2: resolved.lev2,
                marker_freq_fp: resolved.marker_freq_fp,
                alphabet,
                repr: Repr::Small(text.to_vec()),
            });
        }

        let mut dense = alphabet.encode_text(text);
        dense.push(TERMINATOR);

        let sa = build_suffix_array(&dense);
        let (bwt_text, eof_row) = bwt_from_sa(&dense, &sa);
        drop(dense);

        let bwt = CompressedBwt::build(
            &bwt_text,
            alphabet.size(),
            resolved.lev1 as usize,
            resolved.lev2 as usize,
        )?;
        let c_table = c_table_from_bwt(&bwt_text, alphabet.size());

        let step = ResolvedParams::marker_step(resolved.marker_freq_fp);
        let marks = MarkedRows::from_suffix_array(&sa, step);

        Ok(Self {
            text_len: text.len() as u64,
            lev1: resolved.lev1,
            lev2: resolved.lev2,
            marker_freq_fp: resolved.marker_freq_fp,
            alphabet,
            repr: Repr::Indexed(IndexedRepr {
                bwt,
                eof_row,
                c_table,
                marks,
            }),
        })
    }

    /// Length of the indexed text in bytes.
    pub fn text_len(&self) -> u64 {
        self.text_len
    }

    /// Effective (rounded) level-1 block size in bytes.
    pub fn bucket_size_lev1(&self) -> u32 {
        self.lev1
    }

    /// Effective (rounded) level-2 block size in bytes.
    pub fn bucket_size_lev2(&self) -> u32 {
        self.lev2
    }

    /// Marker frequency, recovered from its fixed-point form.
    pub fn marker_freq(&self) -> f64 {
        self.marker_freq_fp as f64 / MARKER_FREQ_ONE as f64
    }

    /// Dense alphabet size, terminator included.
    pub fn alphabet_size(&self) -> usize {
        self.alphabet.size()
    }

    /// True when the text was stored unindexed.
    pub fn is_smalltext(&self) -> bool {
        matches!(self.repr, Repr::Small(_))
    }
}

/// Cumulative symbol counts: `c_table[c]` = symbols smaller than `c`.
fn c_table_from_bwt(bwt: &[u8], sigma: usize) -> Vec<u64> {
    let mut counts = vec![0u64; sigma];
    for &c in bwt {
        counts[c as usize] += 1;
    }
    let mut c_table = Vec::with_capacity(sigma + 1);
    let mut acc = 0u64;
    c_table.push(0);
    for &count in &counts {
        acc += count;
        c_table.push(acc);
    }
    c_table
}
