//! Boyer-Moore exact matcher for texts stored below the small-text
//! threshold, where building the bucket hierarchy is not worth it.
//!
//! Uses both the bad-character rule and the strong good-suffix rule,
//! preprocessed once per pattern.

/// A preprocessed search pattern.
pub struct BoyerMoore<'a> {
    pattern: &'a [u8],
    /// Rightmost index of each byte in the pattern, -1 when absent.
    bad_char: [isize; 256],
    /// Strong good-suffix shift per alignment position.
    good_suffix: Vec<usize>,
}

impl<'a> BoyerMoore<'a> {
    /// Preprocess `pattern`. Must not be empty.
    pub fn new(pattern: &'a [u8]) -> Self {
        debug_assert!(!pattern.is_empty());
        let mut bad_char = [-1isize; 256];
        for (i, &b) in pattern.iter().enumerate() {
            bad_char[b as usize] = i as isize;
        }
        Self {
            pattern,
            bad_char,
            good_suffix: good_suffix_shifts(pattern),
        }
    }

    /// All occurrence offsets in `text`, ascending.
    pub fn find_all(&self, text: &[u8]) -> Vec<u64> {
        let m = self.pattern.len();
        let mut out = Vec::new();
        if m > text.len() {
            return out;
        }

        let mut s = 0usize;
        while s <= text.len() - m {
            let mut j = m as isize - 1;
            while j >= 0 && self.pattern[j as usize] == text[s + j as usize] {
                j -= 1;
            }
            if j < 0 {
                out.push(s as u64);
                s += self.good_suffix[0];
            } else {
                let bc = j - self.bad_char[text[s + j as usize] as usize];
                s += self.good_suffix[j as usize + 1].max(bc.max(1) as usize);
            }
        }
        out
    }
}

/// Strong good-suffix table via the border-array construction.
/// `shifts[j]` is the shift when a mismatch occurs with the suffix
/// `pattern[j..]` already matched.
fn good_suffix_shifts(pattern: &[u8]) -> Vec<usize> {
    let m = pattern.len();
    let mut shifts = vec![0usize; m + 1];
    let mut borders = vec![0usize; m + 1];

    // Case 1: the matched suffix reoccurs preceded by a different char.
    let mut i = m;
    let mut j = m + 1;
    borders[i] = j;
    while i > 0 {
        while j <= m && pattern[i - 1] != pattern[j - 1] {
            if shifts[j] == 0 {
                shifts[j] = j - i;
            }
            j = borders[j];
        }
        i -= 1;
        j -= 1;
        borders[i] = j;
    }

    // Case 2: only a prefix of the pattern matches a suffix border.
    let mut j = borders[0];
    for i in 0..=m {
        if shifts[i] == 0 {
            shifts[i] = j;
        }
        if i == j {
            j = borders[i];
        }
    }

    shifts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(text: &[u8], pattern: &[u8]) -> Vec<u64> {
        if pattern.len() > text.len() {
            return Vec::new();
        }
        text.windows(pattern.len())
            .enumerate()
            .filter(|(_, w)| *w == pattern)
            .map(|(i, _)| i as u64)
            .collect()
    }

    #[test]
    fn test_simple_matches() {
        let bm = BoyerMoore::new(b"ana");
        assert_eq!(bm.find_all(b"banana"), vec![1, 3]);
    }

    #[test]
    fn test_no_match() {
        let bm = BoyerMoore::new(b"xyz");
        assert_eq!(bm.find_all(b"banana"), Vec::<u64>::new());
    }

    #[test]
    fn test_pattern_longer_than_text() {
        let bm = BoyerMoore::new(b"banana");
        assert_eq!(bm.find_all(b"ban"), Vec::<u64>::new());
    }

    #[test]
    fn test_overlapping_occurrences() {
        let bm = BoyerMoore::new(b"aa");
        assert_eq!(bm.find_all(b"aaaa"), vec![0, 1, 2]);
    }

    #[test]
    fn test_whole_text_match() {
        let bm = BoyerMoore::new(b"abc");
        assert_eq!(bm.find_all(b"abc"), vec![0]);
    }

    #[test]
    fn test_against_naive_on_random_text() {
        // Small alphabet forces frequent partial matches.
        let mut state = 0x2545F49u64;
        let mut text = Vec::with_capacity(2000);
        for _ in 0..2000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            text.push(b'a' + ((state >> 33) % 3) as u8);
        }
        for pattern in [b"ab".as_slice(), b"aba", b"abcab", b"ccc", b"aabb"] {
            let bm = BoyerMoore::new(pattern);
            assert_eq!(bm.find_all(&text), naive(&text, pattern), "pattern {pattern:?}");
        }
    }
}
