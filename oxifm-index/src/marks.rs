//! Marked-row table: sampled BWT row -> text offset pairs.
//!
//! A subset of rows carries its text offset explicitly so LF/FL walks
//! terminate after a bounded number of steps. Rows whose suffix offset
//! is a multiple of the sampling step are marked; step 0 marks nothing
//! (every walk runs to the terminator row) and step 1 marks every row.

/// Sparse row -> offset map plus a by-offset view for extract anchors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkedRows {
    /// Sampling step in text positions (0 = no marks).
    step: u64,
    /// `(row, offset)` pairs ascending by row. This is the persisted
    /// order.
    by_row: Vec<(u64, u64)>,
    /// The same pairs ascending by offset; rebuilt on build/load, never
    /// persisted.
    by_pos: Vec<(u64, u64)>,
}

impl MarkedRows {
    /// Sample the suffix array: mark rows whose suffix offset is a
    /// multiple of `step`. The terminator position `n` is never stored;
    /// it is an implicit anchor.
    pub fn from_suffix_array(sa: &[u64], step: u64) -> Self {
        let n = sa.len() as u64 - 1;
        let mut by_row = Vec::new();
        if step > 0 {
            for (row, &pos) in sa.iter().enumerate() {
                if pos < n && pos % step == 0 {
                    by_row.push((row as u64, pos));
                }
            }
        }
        Self::from_pairs(step, by_row)
    }

    /// Reassemble from persisted `(row, offset)` pairs.
    pub fn from_pairs(step: u64, by_row: Vec<(u64, u64)>) -> Self {
        let mut by_pos = by_row.clone();
        by_pos.sort_unstable_by_key(|&(_, pos)| pos);
        Self {
            step,
            by_row,
            by_pos,
        }
    }

    /// Sampling step.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Persisted pairs, ascending by row.
    pub fn pairs(&self) -> &[(u64, u64)] {
        &self.by_row
    }

    /// Number of marked rows.
    pub fn len(&self) -> usize {
        self.by_row.len()
    }

    /// True when no rows are marked.
    pub fn is_empty(&self) -> bool {
        self.by_row.is_empty()
    }

    /// Text offset of `row`, if marked.
    pub fn offset_of(&self, row: u64) -> Option<u64> {
        self.by_row
            .binary_search_by_key(&row, |&(r, _)| r)
            .ok()
            .map(|i| self.by_row[i].1)
    }

    /// Nearest marked `(row, offset)` with offset >= `pos` (backward
    /// extract anchor).
    pub fn anchor_at_or_after(&self, pos: u64) -> Option<(u64, u64)> {
        let i = self.by_pos.partition_point(|&(_, p)| p < pos);
        self.by_pos.get(i).copied()
    }

    /// Nearest marked `(row, offset)` with offset <= `pos` (forward
    /// extract anchor).
    pub fn anchor_at_or_before(&self, pos: u64) -> Option<(u64, u64)> {
        let i = self.by_pos.partition_point(|&(_, p)| p <= pos);
        i.checked_sub(1).map(|i| self.by_pos[i])
    }
}
