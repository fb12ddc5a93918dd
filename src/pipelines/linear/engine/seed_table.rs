//! Exact k-mer occurrence table over the concatenated reference.

use crate::index::reference::ReferenceIndex;
use std::collections::HashMap;

/// Longest seed whose 2-bit code fits in a `u64`.
pub const MAX_SEED_LEN: usize = 32;

pub struct SeedTable {
    k: usize,
    occurrences: HashMap<u64, Vec<u64>>,
}

impl SeedTable {
    /// Indexes every k-mer start of `index`. Positions per k-mer are sorted.
    pub fn build(index: &ReferenceIndex, k: usize) -> Self {
        let k = k.clamp(1, MAX_SEED_LEN);
        let mask = if k == MAX_SEED_LEN { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        let mut occurrences: HashMap<u64, Vec<u64>> = HashMap::new();

        let mut code = 0u64;
        for pos in 0..index.total_length {
            code = ((code << 2) | index.base_at(pos) as u64) & mask;
            if pos + 1 >= k as u64 {
                occurrences.entry(code).or_default().push(pos + 1 - k as u64);
            }
        }
        log::info!(
            "Seed table: {} distinct {}-mers over {} bp",
            occurrences.len(),
            k,
            index.total_length
        );
        Self { k, occurrences }
    }

    #[inline]
    pub fn seed_len(&self) -> usize {
        self.k
    }

    /// Code of a k-long slice of 2-bit bases.
    pub fn encode(&self, bases: &[u8]) -> u64 {
        debug_assert_eq!(bases.len(), self.k);
        bases.iter().fold(0u64, |code, &b| (code << 2) | (b & 3) as u64)
    }

    /// Sorted start positions of the k-mer `code`.
    pub fn lookup(&self, code: u64) -> &[u64] {
        self.occurrences.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn distinct_kmers(&self) -> usize {
        self.occurrences.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_repeated_kmer_positions_are_sorted() {
        let mut rng = StdRng::seed_from_u64(1);
        let idx = ReferenceIndex::from_sequences([("chr1", &b"ACGTTACGTTACGT"[..])], &mut rng);
        let table = SeedTable::build(&idx, 4);
        let code = table.encode(&[0, 1, 2, 3]);
        assert_eq!(table.lookup(code), &[0, 5, 10]);
        assert!(table.lookup(table.encode(&[3, 3, 3, 3])).is_empty());
    }

    #[test]
    fn test_kmers_may_span_contigs() {
        let mut rng = StdRng::seed_from_u64(1);
        let idx = ReferenceIndex::from_sequences(
            [("a", &b"AAAC"[..]), ("b", &b"GTTT"[..])],
            &mut rng,
        );
        let table = SeedTable::build(&idx, 4);
        assert_eq!(table.lookup(table.encode(&[0, 1, 2, 3])), &[2]);
        assert_eq!(table.distinct_kmers(), 5);
    }
}
