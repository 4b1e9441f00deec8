//! Compressed full-text self-index for OxiFM.
//!
//! This crate builds, persists, and queries a Burrows-Wheeler-Transform
//! based FM-index: from arbitrary input text it produces a structure
//! smaller than the text itself from which substrings can be
//! re-extracted, pattern occurrences counted, and occurrence offsets
//! enumerated, all without retaining the original text.
//!
//! The build pipeline:
//! 1. Alphabet remapping - dense 1-based symbols, 0 reserved for the terminator
//! 2. Suffix sort + Burrows-Wheeler Transform
//! 3. Two-level bucket partition with per-symbol occurrence tables
//! 4. Move-to-Front Transform per bucket
//! 5. Grouped canonical Huffman coding per bucket
//!
//! Queries decompress only the buckets they touch, so `count` runs in
//! O(pattern length x buckets touched) rather than O(text length).
//!
//! # Example
//!
//! ```
//! use oxifm_index::{BuildParams, FmIndex};
//!
//! let params = BuildParams::default().with_smalltext_threshold(0);
//! let index = FmIndex::build(b"ACGTACGTACGT", &params).unwrap();
//! assert_eq!(index.count(b"ACGT").unwrap(), 3);
//! let mut positions = index.locate(b"ACGT").unwrap();
//! positions.sort_unstable();
//! assert_eq!(positions, vec![0, 4, 8]);
//! assert_eq!(index.extract(4, 4).unwrap(), b"ACGT");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod alphabet;
mod boyer_moore;
mod bucket;
mod build;
mod huffman;
mod marks;
mod mtf;
mod prologue;
mod query;
mod suffix;

pub use build::FmIndex;
pub use oxifm_core::error::{OxiFmError, Result};

/// Index prologue magic bytes ("OXFM").
pub const INDEX_MAGIC: [u8; 4] = [0x4F, 0x58, 0x46, 0x4D];

/// Persisted format version.
pub const FORMAT_VERSION: u8 = 1;

/// Minimum granularity of both bucket levels, in bytes.
pub const BLOCK_GRANULARITY: u32 = 256;

/// Largest accepted level-2 bucket size, in bytes.
pub const MAX_BUCKET_SIZE_LEV2: u32 = 65536;

/// Default threshold below which the text is stored unindexed.
pub const DEFAULT_SMALLTEXT_THRESHOLD: usize = 1024;

/// Fixed-point denominator for the persisted marker frequency.
pub(crate) const MARKER_FREQ_ONE: u32 = 65536;

/// Validated build parameters.
///
/// Block sizes are rounded, not rejected: the level-2 size is forced up
/// to a multiple of [`BLOCK_GRANULARITY`] and the level-1 size up to a
/// multiple of the level-2 size. The marker frequency is the fraction
/// of BWT rows whose text position is stored explicitly (0 = none,
/// 1 = all).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildParams {
    /// Level-1 (superbucket) block size in KiB.
    pub bucket_size_lev1_kb: u32,
    /// Level-2 (bucket) block size in bytes.
    pub bucket_size_lev2: u32,
    /// Fraction of rows marked with their text position, in `[0, 1]`.
    pub marker_freq: f64,
    /// Texts shorter than this are stored unindexed (0 disables).
    pub smalltext_threshold: usize,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            bucket_size_lev1_kb: 16,
            bucket_size_lev2: 1024,
            marker_freq: 0.02,
            smalltext_threshold: DEFAULT_SMALLTEXT_THRESHOLD,
        }
    }
}

impl BuildParams {
    /// Set the level-1 block size in KiB.
    pub fn with_bucket_size_lev1_kb(mut self, kb: u32) -> Self {
        self.bucket_size_lev1_kb = kb;
        self
    }

    /// Set the level-2 block size in bytes.
    pub fn with_bucket_size_lev2(mut self, bytes: u32) -> Self {
        self.bucket_size_lev2 = bytes;
        self
    }

    /// Set the marker frequency.
    pub fn with_marker_freq(mut self, freq: f64) -> Self {
        self.marker_freq = freq;
        self
    }

    /// Set the small-text threshold (0 disables the escape path).
    pub fn with_smalltext_threshold(mut self, threshold: usize) -> Self {
        self.smalltext_threshold = threshold;
        self
    }

    /// Validate and round the parameters.
    ///
    /// Rejection happens here, before any allocation; the returned
    /// values are the effective (rounded) block sizes and the
    /// fixed-point marker frequency.
    pub(crate) fn resolve(&self) -> Result<ResolvedParams> {
        if self.bucket_size_lev1_kb == 0 {
            return Err(OxiFmError::invalid_parameters(
                "level-1 block size must be at least 1 KiB",
            ));
        }
        if self.bucket_size_lev2 == 0 || self.bucket_size_lev2 > MAX_BUCKET_SIZE_LEV2 {
            return Err(OxiFmError::invalid_parameters(format!(
                "level-2 block size must be in 1..={MAX_BUCKET_SIZE_LEV2} bytes"
            )));
        }
        if !self.marker_freq.is_finite() || !(0.0..=1.0).contains(&self.marker_freq) {
            return Err(OxiFmError::invalid_parameters(
                "marker frequency must be in [0, 1]",
            ));
        }

        let lev2 = self.bucket_size_lev2.div_ceil(BLOCK_GRANULARITY) * BLOCK_GRANULARITY;
        // Round in u64: a level-1 size near u32::MAX KiB would overflow
        // the 32-bit multiply.
        let lev1_raw = u64::from(self.bucket_size_lev1_kb) * 1024;
        let lev1 = lev1_raw
            .max(u64::from(lev2))
            .div_ceil(u64::from(lev2))
            * u64::from(lev2);
        let lev1 = u32::try_from(lev1).map_err(|_| {
            OxiFmError::invalid_parameters("level-1 block size exceeds 32 bits after rounding")
        })?;
        let marker_freq_fp = (self.marker_freq * MARKER_FREQ_ONE as f64).round() as u32;

        Ok(ResolvedParams {
            lev1,
            lev2,
            marker_freq_fp,
        })
    }
}

/// Effective build parameters after rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedParams {
    pub lev1: u32,
    pub lev2: u32,
    pub marker_freq_fp: u32,
}

impl ResolvedParams {
    /// Marked-row sampling step derived from the fixed-point frequency.
    /// 0 means no rows are marked.
    pub fn marker_step(marker_freq_fp: u32) -> u64 {
        if marker_freq_fp == 0 {
            0
        } else {
            let fp = marker_freq_fp as u64;
            ((MARKER_FREQ_ONE as u64 + fp / 2) / fp).max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_rounding() {
        let params = BuildParams::default().with_bucket_size_lev2(300);
        let resolved = params.resolve().unwrap();
        // Rounded up to the next multiple of the granularity.
        assert_eq!(resolved.lev2, 512);
        assert_eq!(resolved.lev1 % resolved.lev2, 0);
    }

    #[test]
    fn test_params_lev1_forced_to_lev2_multiple() {
        let params = BuildParams::default()
            .with_bucket_size_lev1_kb(1)
            .with_bucket_size_lev2(3000);
        let resolved = params.resolve().unwrap();
        assert_eq!(resolved.lev2, 3072);
        // 1 KiB is below one bucket, so one bucket per superbucket.
        assert_eq!(resolved.lev1, 3072);
    }

    #[test]
    fn test_params_rejected() {
        assert!(
            BuildParams::default()
                .with_bucket_size_lev2(0)
                .resolve()
                .is_err()
        );
        assert!(
            BuildParams::default()
                .with_marker_freq(1.5)
                .resolve()
                .is_err()
        );
        assert!(
            BuildParams::default()
                .with_marker_freq(f64::NAN)
                .resolve()
                .is_err()
        );
    }

    #[test]
    fn test_params_lev1_overflow_rejected() {
        // A level-1 size too large for 32 bits must be rejected, not
        // wrapped or panicked on.
        let err = BuildParams::default()
            .with_bucket_size_lev1_kb(u32::MAX)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, OxiFmError::InvalidParameters { .. }));

        // The largest representable level-1 size still resolves.
        let params = BuildParams::default().with_bucket_size_lev1_kb((u32::MAX >> 10) - 1);
        assert!(params.resolve().is_ok());
    }

    #[test]
    fn test_marker_step() {
        assert_eq!(ResolvedParams::marker_step(0), 0);
        assert_eq!(ResolvedParams::marker_step(MARKER_FREQ_ONE), 1);
        assert_eq!(ResolvedParams::marker_step(MARKER_FREQ_ONE / 2), 2);
        // 2% -> every 50th row.
        let fp = (0.02 * MARKER_FREQ_ONE as f64).round() as u32;
        assert_eq!(ResolvedParams::marker_step(fp), 50);
    }
}
