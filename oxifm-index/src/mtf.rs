//! Move-to-Front Transform over a bucket's declared alphabet.
//!
//! MTF replaces each symbol with its position in a recency-ordered
//! list and then promotes it to the front, concentrating the runs the
//! BWT produces into small rank values for the Huffman coder. Encode
//! and decode rebuild the same list from the same initial ordering:
//! the bucket's present symbols in ascending dense order.

/// Move-to-Front encode `data` against `alphabet`.
///
/// `alphabet` must contain every symbol of `data` exactly once, in
/// ascending order.
pub fn encode(data: &[u8], alphabet: &[u8]) -> Vec<u8> {
    let mut list = alphabet.to_vec();
    let mut result = Vec::with_capacity(data.len());

    for &sym in data {
        let pos = list
            .iter()
            .position(|&s| s == sym)
            .expect("MTF: symbol must be in the bucket alphabet");
        result.push(pos as u8);

        if pos > 0 {
            list.remove(pos);
            list.insert(0, sym);
        }
    }

    result
}

/// Inverse Move-to-Front: rebuild the symbols from their ranks.
pub fn decode(ranks: &[u8], alphabet: &[u8]) -> Vec<u8> {
    let mut list = alphabet.to_vec();
    let mut result = Vec::with_capacity(ranks.len());

    for &pos in ranks {
        let sym = list[pos as usize];
        result.push(sym);

        if pos > 0 {
            list.remove(pos as usize);
            list.insert(0, sym);
        }
    }

    result
}
