//! Suffix sorting and BWT construction.
//!
//! The suffix array is built with prefix doubling over the standard
//! library's unstable sort; the BWT itself is only the permutation step
//! `bwt[i] = text[(sa[i] + m - 1) % m]` on top of that sort. Input is
//! the dense-remapped text with the terminator symbol (dense 0)
//! appended, which makes every suffix distinct.

/// Build the suffix array of `text` by prefix doubling, O(n log^2 n).
///
/// `text` is expected to end with a unique smallest symbol so all
/// suffix comparisons terminate.
pub fn build_suffix_array(text: &[u8]) -> Vec<u64> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| b as i64).collect();
    let mut next_rank: Vec<i64> = vec![0; n];

    let key = |rank: &[i64], i: usize, k: usize| -> (i64, i64) {
        let second = if i + k < n { rank[i + k] } else { -1 };
        (rank[i], second)
    };

    let mut k = 1usize;
    while k < n {
        sa.sort_unstable_by_key(|&i| key(&rank, i, k));

        next_rank[sa[0]] = 0;
        for i in 1..n {
            let prev = key(&rank, sa[i - 1], k);
            let curr = key(&rank, sa[i], k);
            next_rank[sa[i]] = next_rank[sa[i - 1]] + i64::from(curr != prev);
        }
        rank.copy_from_slice(&next_rank);

        if rank[sa[n - 1]] as usize == n - 1 {
            break;
        }
        k <<= 1;
    }

    sa.into_iter().map(|i| i as u64).collect()
}

/// Compute the BWT string and the terminator row from a suffix array.
///
/// Returns `(bwt, eof_row)` where `eof_row` is the row whose suffix
/// starts at text offset 0, i.e. the row carrying the terminator symbol
/// in the BWT.
pub fn bwt_from_sa(text: &[u8], sa: &[u64]) -> (Vec<u8>, u64) {
    let m = text.len();
    let mut bwt = Vec::with_capacity(m);
    let mut eof_row = 0u64;

    for (row, &pos) in sa.iter().enumerate() {
        if pos == 0 {
            eof_row = row as u64;
            bwt.push(text[m - 1]);
        } else {
            bwt.push(text[pos as usize - 1]);
        }
    }

    (bwt, eof_row)
}
