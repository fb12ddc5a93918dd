//! Small sequence helpers shared across the crate.

use rand::Rng;

/// ASCII to 2-bit nucleotide code. A=0, C=1, G=2, T=3, anything else 4.
pub const NST_NT4_TABLE: [u8; 256] = {
    let mut table = [4u8; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table
};

/// Thomas Wang's 64-bit integer hash.
pub fn hash_64(key: u64) -> u64 {
    let mut key = key;
    key = key.wrapping_add(!key.wrapping_shl(32));
    key ^= key.wrapping_shr(22);
    key = key.wrapping_add(!key.wrapping_shl(13));
    key ^= key.wrapping_shr(8);
    key = key.wrapping_add(key.wrapping_shl(3));
    key ^= key.wrapping_shr(15);
    key = key.wrapping_add(!key.wrapping_shl(27));
    key ^= key.wrapping_shr(31);
    key
}

/// 2-bit encodes `seq`, substituting ambiguous bases with draws from `rng`.
///
/// Returns the codes and the number of substituted bases.
pub fn encode_query<R: Rng + ?Sized>(seq: &[u8], rng: &mut R) -> (Vec<u8>, usize) {
    let mut substituted = 0;
    let codes = seq
        .iter()
        .map(|&b| match NST_NT4_TABLE[b as usize] {
            4 => {
                substituted += 1;
                rng.gen_range(0..4)
            }
            code => code,
        })
        .collect();
    (codes, substituted)
}

/// Reverse complement of 2-bit codes.
pub fn reverse_complement_codes(codes: &[u8]) -> Vec<u8> {
    codes.iter().rev().map(|&c| 3 - (c & 3)).collect()
}

/// Reverse complement of an ASCII sequence. Non-ACGT characters map to `N`.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'a' => b't',
            b'C' => b'G',
            b'c' => b'g',
            b'G' => b'C',
            b'g' => b'c',
            b'T' => b'A',
            b't' => b'a',
            _ => b'N',
        })
        .collect()
}
