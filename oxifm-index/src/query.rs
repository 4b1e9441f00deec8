//! Query engine: backward-search count, LF-walk locate, and
//! two-direction extract.
//!
//! All occurrence counts come from the bucket hierarchy, so each
//! backward-search step decompresses at most the two buckets holding
//! the range endpoints. Locate walks LF-mapping steps to the nearest
//! marked row; extract reconstructs text either backward (LF) from a
//! marked anchor after the range or forward (FL) from one before it,
//! whichever is nearer.

use crate::alphabet::AlphabetMap;
use crate::boyer_moore::BoyerMoore;
use crate::bucket::QueryScratch;
use crate::build::{FmIndex, IndexedRepr, Repr};
use oxifm_core::error::{OxiFmError, Result};

impl FmIndex {
    /// Number of occurrences of `pattern` in the indexed text.
    ///
    /// The empty pattern matches every position boundary and counts
    /// `text_len + 1`. Patterns longer than the text are rejected with
    /// [`OxiFmError::PatternTooLong`].
    pub fn count(&self, pattern: &[u8]) -> Result<u64> {
        if pattern.len() as u64 > self.text_len {
            return Err(OxiFmError::pattern_too_long(
                pattern.len(),
                self.text_len as usize,
            ));
        }
        if pattern.is_empty() {
            return Ok(self.text_len + 1);
        }

        match &self.repr {
            Repr::Small(text) => Ok(BoyerMoore::new(pattern).find_all(text).len() as u64),
            Repr::Indexed(idx) => {
                let Some(dense) = self.alphabet.encode_pattern(pattern) else {
                    return Ok(0);
                };
                let mut scratch = QueryScratch::default();
                Ok(match idx.backward_search(&dense, &mut scratch)? {
                    Some((first, last)) => last - first + 1,
                    None => 0,
                })
            }
        }
    }

    /// Starting offsets of every occurrence of `pattern`, unordered.
    ///
    /// Always returns exactly [`count`](FmIndex::count) offsets; the
    /// empty pattern yields every boundary `0..=text_len`.
    pub fn locate(&self, pattern: &[u8]) -> Result<Vec<u64>> {
        if pattern.len() as u64 > self.text_len {
            return Err(OxiFmError::pattern_too_long(
                pattern.len(),
                self.text_len as usize,
            ));
        }
        if pattern.is_empty() {
            return Ok((0..=self.text_len).collect());
        }

        match &self.repr {
            Repr::Small(text) => Ok(BoyerMoore::new(pattern).find_all(text)),
            Repr::Indexed(idx) => {
                let Some(dense) = self.alphabet.encode_pattern(pattern) else {
                    return Ok(Vec::new());
                };
                let mut scratch = QueryScratch::default();
                let Some((first, last)) = idx.backward_search(&dense, &mut scratch)? else {
                    return Ok(Vec::new());
                };
                let mut offsets = Vec::with_capacity((last - first + 1) as usize);
                for row in first..=last {
                    offsets.push(idx.row_offset(row, &mut scratch)?);
                }
                Ok(offsets)
            }
        }
    }

    /// Re-extract `len` bytes of the original text starting at `start`.
    pub fn extract(&self, start: u64, len: u64) -> Result<Vec<u8>> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| OxiFmError::range_error(start, len, self.text_len))?;
        if end > self.text_len {
            return Err(OxiFmError::range_error(start, len, self.text_len));
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        match &self.repr {
            Repr::Small(text) => Ok(text[start as usize..end as usize].to_vec()),
            Repr::Indexed(idx) => idx.extract(&self.alphabet, self.text_len, start, end),
        }
    }
}

impl IndexedRepr {
    /// Classic backward search: returns the inclusive row range of
    /// suffixes prefixed by `pattern`, or `None` when it vanishes.
    fn backward_search(
        &self,
        pattern: &[u8],
        scratch: &mut QueryScratch,
    ) -> Result<Option<(u64, u64)>> {
        let rows = self.bwt.len as u64;
        let mut first = 0u64;
        let mut last = rows - 1;

        for &c in pattern.iter().rev() {
            let base = self.c_table[c as usize];
            let lo = base + self.bwt.occ(scratch, c, first as usize)?;
            let hi = base + self.bwt.occ(scratch, c, last as usize + 1)?;
            if lo >= hi {
                return Ok(None);
            }
            first = lo;
            last = hi - 1;
        }

        Ok(Some((first, last)))
    }

    /// One LF-mapping step: the row of the same character's occurrence
    /// one text position earlier.
    fn lf_step(&self, scratch: &mut QueryScratch, row: u64) -> Result<u64> {
        let c = self.bwt.symbol_at(scratch, row as usize)?;
        Ok(self.c_table[c as usize] + self.bwt.occ(scratch, c, row as usize)?)
    }

    /// Text offset of `row`, walking LF steps until a marked row or the
    /// terminator row (offset 0) is reached.
    fn row_offset(&self, row: u64, scratch: &mut QueryScratch) -> Result<u64> {
        let mut r = row;
        let mut steps = 0u64;
        loop {
            if r == self.eof_row {
                return Ok(steps);
            }
            if let Some(pos) = self.marks.offset_of(r) {
                return Ok(pos + steps);
            }
            r = self.lf_step(scratch, r)?;
            steps += 1;
        }
    }

    /// First-column symbol of `row`: the dense symbol `c` with
    /// `c_table[c] <= row < c_table[c + 1]`.
    fn f_char(&self, row: u64) -> u8 {
        (self.c_table.partition_point(|&v| v <= row) - 1) as u8
    }

    /// Extract `[start, end)` choosing the nearer marked anchor.
    fn extract(
        &self,
        alphabet: &AlphabetMap,
        text_len: u64,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>> {
        // Row 0 (offset text_len) and the terminator row (offset 0) are
        // always available as implicit anchors.
        let (back_row, back_pos) = self
            .marks
            .anchor_at_or_after(end)
            .unwrap_or((0, text_len));
        let (fwd_row, fwd_pos) = self
            .marks
            .anchor_at_or_before(start)
            .unwrap_or((self.eof_row, 0));

        let mut scratch = QueryScratch::default();
        if end - fwd_pos <= back_pos - start {
            self.extract_forward(alphabet, start, end, fwd_row, fwd_pos, &mut scratch)
        } else {
            self.extract_backward(alphabet, start, end, back_row, back_pos, &mut scratch)
        }
    }

    /// Backward reconstruction: LF-walk from an anchor at/after `end`,
    /// emitting one character per step once inside the range.
    fn extract_backward(
        &self,
        alphabet: &AlphabetMap,
        start: u64,
        end: u64,
        row: u64,
        pos: u64,
        scratch: &mut QueryScratch,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity((end - start) as usize);
        let mut r = row;
        let mut p = pos;

        while p > start {
            let c = self.bwt.symbol_at(scratch, r as usize)?;
            if p <= end {
                out.push(alphabet.decode(c));
            }
            r = self.c_table[c as usize] + self.bwt.occ(scratch, c, r as usize)?;
            p -= 1;
        }

        out.reverse();
        Ok(out)
    }

    /// Forward reconstruction: FL-walk from an anchor at/before
    /// `start`, reading the first-column character and rank-selecting
    /// into the next row.
    fn extract_forward(
        &self,
        alphabet: &AlphabetMap,
        start: u64,
        end: u64,
        row: u64,
        pos: u64,
        scratch: &mut QueryScratch,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity((end - start) as usize);
        let mut r = row;
        let mut p = pos;

        while p < end {
            let c = self.f_char(r);
            if p >= start {
                out.push(alphabet.decode(c));
            }
            if p + 1 < end {
                let rank = r - self.c_table[c as usize];
                r = self.bwt.select(scratch, c, rank)? as u64;
            }
            p += 1;
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildParams;

    fn indexed(text: &[u8]) -> FmIndex {
        let params = BuildParams::default().with_smalltext_threshold(0);
        FmIndex::build(text, &params).unwrap()
    }

    fn naive_positions(text: &[u8], pattern: &[u8]) -> Vec<u64> {
        if pattern.is_empty() || pattern.len() > text.len() {
            return Vec::new();
        }
        text.windows(pattern.len())
            .enumerate()
            .filter(|(_, w)| *w == pattern)
            .map(|(i, _)| i as u64)
            .collect()
    }

    #[test]
    fn test_count_banana() {
        let index = indexed(b"banana");
        assert_eq!(index.count(b"ana").unwrap(), 2);
        assert_eq!(index.count(b"na").unwrap(), 2);
        assert_eq!(index.count(b"banana").unwrap(), 1);
        assert_eq!(index.count(b"nab").unwrap(), 0);
        assert_eq!(index.count(b"x").unwrap(), 0);
    }

    #[test]
    fn test_count_empty_pattern() {
        let index = indexed(b"banana");
        assert_eq!(index.count(b"").unwrap(), 7);
    }

    #[test]
    fn test_pattern_too_long() {
        let index = indexed(b"abc");
        let err = index.count(b"abcd").unwrap_err();
        assert!(matches!(err, OxiFmError::PatternTooLong { len: 4, max: 3 }));
    }

    #[test]
    fn test_locate_matches_naive() {
        let text = b"mississippi";
        let index = indexed(text);
        for pattern in [b"s".as_slice(), b"si", b"issi", b"ppi", b"mississippi", b"q"] {
            let mut got = index.locate(pattern).unwrap();
            got.sort_unstable();
            assert_eq!(got, naive_positions(text, pattern), "pattern {pattern:?}");
        }
    }

    #[test]
    fn test_locate_count_consistency() {
        let text = b"abracadabra abracadabra";
        let index = indexed(text);
        for pattern in [b"abra".as_slice(), b"a", b"cad", b" "] {
            assert_eq!(
                index.locate(pattern).unwrap().len() as u64,
                index.count(pattern).unwrap()
            );
        }
    }

    #[test]
    fn test_extract_full_text() {
        let text = b"the quick brown fox jumps over the lazy dog";
        let index = indexed(text);
        assert_eq!(index.extract(0, text.len() as u64).unwrap(), text);
    }

    #[test]
    fn test_extract_substrings() {
        let text = b"the quick brown fox jumps over the lazy dog";
        let index = indexed(text);
        assert_eq!(index.extract(4, 5).unwrap(), b"quick");
        assert_eq!(index.extract(0, 3).unwrap(), b"the");
        assert_eq!(index.extract(40, 3).unwrap(), b"dog");
        assert_eq!(index.extract(10, 0).unwrap(), b"");
    }

    #[test]
    fn test_extract_out_of_range() {
        let index = indexed(b"abc");
        assert!(matches!(
            index.extract(2, 2).unwrap_err(),
            OxiFmError::RangeError { .. }
        ));
        assert!(matches!(
            index.extract(u64::MAX, 2).unwrap_err(),
            OxiFmError::RangeError { .. }
        ));
    }

    #[test]
    fn test_extract_no_marks_still_works() {
        // Marker frequency 0: every walk runs to an implicit anchor.
        let params = BuildParams::default()
            .with_smalltext_threshold(0)
            .with_marker_freq(0.0);
        let text = b"abracadabra";
        let index = FmIndex::build(text, &params).unwrap();
        assert_eq!(index.extract(0, 11).unwrap(), text);
        assert_eq!(index.extract(3, 4).unwrap(), b"acad");
        let mut got = index.locate(b"abra").unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![0, 7]);
    }

    #[test]
    fn test_smalltext_queries() {
        let text = b"banana band bandana";
        let index = FmIndex::build(text, &BuildParams::default()).unwrap();
        assert!(index.is_smalltext());
        assert_eq!(index.count(b"ban").unwrap(), 3);
        let mut got = index.locate(b"ban").unwrap();
        got.sort_unstable();
        assert_eq!(got, naive_positions(text, b"ban"));
        assert_eq!(index.extract(7, 4).unwrap(), b"band");
    }
}
