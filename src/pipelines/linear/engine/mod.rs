//! Built-in seed-and-extend engine.
//!
//! A small exact-seed engine so the pipeline can run end to end without an
//! external aligner:
//!
//! - non-overlapping k-mer seeds looked up in a [`SeedTable`]
//! - seeds on the same diagonal grouped into one hit
//! - hits built only from unique seeds are reported as narrow and extended
//!   by the pipeline; the others are extended here
//! - seeds with more than `max_occ` occurrences become symbolic entries
//! - ungapped X-drop extension, all-match operation sequences

pub mod seed_table;

use std::collections::BTreeMap;

use crate::core::alignment::cigar::{CigarKind, CigarOp};
use crate::core::alignment::engine::{AlignmentEngine, CigarAlignment, ExtendDirection};
use crate::core::alignment::types::{Hit, Orientation, OrientedHits, RedundantInterval};
use crate::core::alignment::workspace::Arena;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::error::EngineError;
use crate::pipelines::linear::mem_opt::MemOpt;

pub use seed_table::SeedTable;

/// Extension stops once the running score falls this far below its best.
const X_DROP: i32 = 20;

/// Seeds sharing one diagonal.
struct Diagonal {
    query_begin: usize,
    query_end: usize,
    seeds: i32,
    unique: bool,
}

pub struct SeedEngine {
    table: SeedTable,
    match_score: i32,
    mismatch_penalty: i32,
    max_occ: usize,
    drop_ratio: f32,
    mask_level: f32,
    min_seed_len: i32,
}

impl SeedEngine {
    pub fn new(index: &ReferenceIndex, opt: &MemOpt) -> Self {
        Self {
            table: SeedTable::build(index, opt.min_seed_len.max(1) as usize),
            match_score: opt.a,
            mismatch_penalty: opt.b,
            max_occ: opt.max_occ.max(1) as usize,
            drop_ratio: opt.drop_ratio,
            mask_level: opt.mask_level,
            min_seed_len: opt.min_seed_len,
        }
    }

    pub fn seed_table(&self) -> &SeedTable {
        &self.table
    }

    /// Ungapped score of `query[begin..begin + reference.len()]` against `reference`.
    fn span_score(&self, query: &[u8], begin: usize, reference: &[u8]) -> (i32, i32) {
        let mismatches = query[begin..begin + reference.len()]
            .iter()
            .zip(reference)
            .filter(|(q, r)| q != r)
            .count() as i32;
        let matches = reference.len() as i32 - mismatches;
        (matches * self.match_score - mismatches * self.mismatch_penalty, mismatches)
    }

    fn scored_hit(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        ref_start: u64,
        query_begin: usize,
        query_end: usize,
        arena: &mut Arena,
    ) -> Result<Hit, EngineError> {
        let len = query_end - query_begin;
        let window = arena.scratch(len)?;
        index.fetch_into(ref_start, window).map_err(EngineError::Inconsistent)?;
        let (score, _) = self.span_score(query, query_begin, window);
        Ok(Hit::new(ref_start, len as u64, query_begin as i32, query_end as i32, score))
    }

    /// X-drop walk. `pairs` yields (query base, reference base) moving away
    /// from the hit; returns the best gain and the number of bases it covers.
    fn x_drop(&self, pairs: impl Iterator<Item = (u8, u8)>) -> (i32, usize) {
        let (mut run, mut best, mut best_len) = (0, 0, 0);
        for (i, (q, r)) in pairs.enumerate() {
            run += if q == r { self.match_score } else { -self.mismatch_penalty };
            if run > best {
                best = run;
                best_len = i + 1;
            } else if best - run > X_DROP {
                break;
            }
        }
        (best, best_len)
    }
}

impl AlignmentEngine for SeedEngine {
    fn search(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        orientation: Orientation,
        arena: &mut Arena,
    ) -> Result<OrientedHits, EngineError> {
        let k = self.table.seed_len();
        let mut out = OrientedHits::empty(orientation);
        if query.len() < k {
            return Ok(out);
        }

        let mut diagonals: BTreeMap<i64, Diagonal> = BTreeMap::new();
        let mut repetitive: Vec<u64> = Vec::new();

        for qb in (0..=query.len() - k).step_by(k) {
            let code = self.table.encode(&query[qb..qb + k]);
            let positions = self.table.lookup(code);
            if positions.is_empty() {
                continue;
            }
            if positions.len() > self.max_occ {
                if repetitive.contains(&code) {
                    continue;
                }
                repetitive.push(code);
                // Scored on the first occurrence, extended rightwards only so
                // that every occurrence lines up with query_begin.
                let seed = self.scored_hit(index, query, positions[0], qb, qb + k, arena)?;
                let mut hit = self.extend(index, query, &seed, ExtendDirection::Right, arena)?;
                hit.redundant = Some(RedundantInterval { key: code, count: positions.len() as u64 });
                hit.ref_start = 0;
                out.general.push(hit);
                continue;
            }
            let unique = positions.len() == 1;
            for &pos in positions {
                let d = diagonals.entry(pos as i64 - qb as i64).or_insert(Diagonal {
                    query_begin: qb,
                    query_end: qb + k,
                    seeds: 0,
                    unique: true,
                });
                d.query_begin = d.query_begin.min(qb);
                d.query_end = d.query_end.max(qb + k);
                d.seeds += 1;
                d.unique &= unique;
            }
        }

        for (diag, d) in diagonals {
            let ref_start = (diag + d.query_begin as i64) as u64;
            let mut hit =
                self.scored_hit(index, query, ref_start, d.query_begin, d.query_end, arena)?;
            hit.seed_support = d.seeds;
            if d.unique {
                out.narrow.push(hit);
            } else {
                let left = self.extend(index, query, &hit, ExtendDirection::Left, arena)?;
                out.general.push(self.extend(index, query, &left, ExtendDirection::Right, arena)?);
            }
        }
        log::trace!(
            "{orientation:?}: {} narrow, {} general hits",
            out.narrow.len(),
            out.general.len()
        );
        Ok(out)
    }

    fn filter_chains(&self, hits: Vec<Hit>) -> Vec<Hit> {
        let mut hits = hits;
        hits.sort_by(|a, b| b.score.cmp(&a.score).then(a.ref_start.cmp(&b.ref_start)));

        let mut kept: Vec<Hit> = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut drop = false;
            for better in &kept {
                let overlap = hit.query_end.min(better.query_end) - hit.query_begin.max(better.query_begin);
                if overlap <= 0 {
                    continue;
                }
                let min_len = hit.query_len().min(better.query_len());
                if overlap as f32 >= min_len as f32 * self.mask_level {
                    drop = (hit.score as f32) < better.score as f32 * self.drop_ratio
                        && better.score - hit.score >= self.min_seed_len << 1;
                    break;
                }
            }
            if drop {
                log::trace!("chain at {} (score {}) dropped", hit.ref_start, hit.score);
            } else {
                kept.push(hit);
            }
        }
        kept
    }

    fn extend(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        hit: &Hit,
        direction: ExtendDirection,
        arena: &mut Arena,
    ) -> Result<Hit, EngineError> {
        let mut out = hit.clone();
        match direction {
            ExtendDirection::Left => {
                let room = (hit.query_begin.max(0) as u64).min(hit.ref_start) as usize;
                if room == 0 {
                    return Ok(out);
                }
                let window = arena.scratch(room)?;
                index
                    .fetch_into(hit.ref_start - room as u64, window)
                    .map_err(EngineError::Inconsistent)?;
                let qb = hit.query_begin as usize;
                let (gain, len) =
                    self.x_drop((1..=room).map(|i| (query[qb - i], window[room - i])));
                out.query_begin -= len as i32;
                out.ref_start -= len as u64;
                out.ref_len += len as u64;
                out.score += gain;
            }
            ExtendDirection::Right => {
                let qe = hit.query_end as usize;
                let q_room = query.len().saturating_sub(qe);
                let r_room = index.total_length.saturating_sub(hit.ref_end()) as usize;
                let room = q_room.min(r_room);
                if room == 0 {
                    return Ok(out);
                }
                let window = arena.scratch(room)?;
                index.fetch_into(hit.ref_end(), window).map_err(EngineError::Inconsistent)?;
                let (gain, len) = self.x_drop((0..room).map(|i| (query[qe + i], window[i])));
                out.query_end += len as i32;
                out.ref_len += len as u64;
                out.score += gain;
            }
        }
        Ok(out)
    }

    fn cigar(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        begin: usize,
        end: usize,
        hit: &Hit,
    ) -> Result<CigarAlignment, EngineError> {
        let len = end - begin;
        if hit.ref_len != len as u64 {
            return Err(EngineError::Inconsistent(format!(
                "ungapped hit spans {} reference bases for {} query bases",
                hit.ref_len, len
            )));
        }
        let reference = index.fetch(hit.ref_start, len as u64).map_err(EngineError::Inconsistent)?;
        let (score, mismatches) = self.span_score(query, begin, &reference);
        let ops = if len > 0 { vec![CigarOp::new(CigarKind::Match, len as u32)] } else { Vec::new() };
        Ok(CigarAlignment { ops, score, edit_distance: mismatches })
    }

    fn locate(&self, _index: &ReferenceIndex, interval: &RedundantInterval, rank: u64) -> Option<u64> {
        self.table.lookup(interval.key).get(rank as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_bases(len: usize, rng: &mut StdRng) -> Vec<u8> {
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    fn setup() -> (ReferenceIndex, Vec<u8>, SeedEngine) {
        let mut rng = StdRng::seed_from_u64(7);
        let seq = random_bases(2000, &mut rng);
        let idx = ReferenceIndex::from_sequences([("chr1", seq.as_slice())], &mut rng);
        let engine = SeedEngine::new(&idx, &MemOpt::default());
        let codes = idx.fetch(0, idx.total_length).unwrap();
        (idx, codes, engine)
    }

    #[test]
    fn test_unique_read_yields_narrow_hit() {
        let (idx, codes, engine) = setup();
        let query = codes[100..140].to_vec();
        let mut arena = Arena::new();
        let hits = engine.search(&idx, &query, Orientation::Forward, &mut arena).unwrap();
        assert_eq!(hits.narrow.len(), 1);
        assert!(hits.general.is_empty());
        let hit = &hits.narrow[0];
        // seeds at 0 and 19
        assert_eq!((hit.ref_start, hit.query_begin, hit.query_end), (100, 0, 38));
        assert_eq!(hit.seed_support, 2);

        let full = engine.extend(&idx, &query, hit, ExtendDirection::Right, &mut arena).unwrap();
        assert_eq!((full.query_end, full.ref_len, full.score), (40, 40, 40));
        assert!(arena.capacity() >= 2);
    }

    #[test]
    fn test_left_extension_stops_at_read_start() {
        let (idx, codes, engine) = setup();
        let query = codes[500..540].to_vec();
        let hit = Hit::new(510, 20, 10, 30, 20);
        let mut arena = Arena::new();
        let left = engine.extend(&idx, &query, &hit, ExtendDirection::Left, &mut arena).unwrap();
        assert_eq!((left.ref_start, left.query_begin, left.score), (500, 0, 30));
    }

    #[test]
    fn test_cigar_counts_mismatches() {
        let (idx, codes, engine) = setup();
        let mut query = codes[300..330].to_vec();
        query[5] = (query[5] + 1) & 3;
        let hit = Hit::new(300, 30, 0, 30, 25);
        let aln = engine.cigar(&idx, &query, 0, 30, &hit).unwrap();
        assert_eq!(aln.ops, vec![CigarOp::new(CigarKind::Match, 30)]);
        assert_eq!(aln.edit_distance, 1);
        assert_eq!(aln.score, 29 - 4);
    }

    #[test]
    fn test_cigar_rejects_gapped_footprint() {
        let (idx, codes, engine) = setup();
        let hit = Hit::new(300, 31, 0, 30, 25);
        assert!(engine.cigar(&idx, &codes[300..330], 0, 30, &hit).is_err());
    }

    #[test]
    fn test_filter_drops_weak_overlapping_chain() {
        let (_, _, engine) = setup();
        let strong = Hit::new(0, 100, 0, 100, 100);
        let weak = Hit::new(900, 90, 5, 95, 20);
        let elsewhere = Hit::new(1500, 20, 100, 120, 20);
        let kept = engine.filter_chains(vec![weak, strong.clone(), elsewhere.clone()]);
        assert_eq!(kept, vec![strong, elsewhere]);
    }

    #[test]
    fn test_repetitive_seed_becomes_symbolic() {
        let mut rng = StdRng::seed_from_u64(3);
        let unit = random_bases(40, &mut rng);
        let seq: Vec<u8> = unit.iter().cycle().take(40 * 4).copied().collect();
        let idx = ReferenceIndex::from_sequences([("rep", seq.as_slice())], &mut rng);
        let opt = MemOpt { max_occ: 2, ..Default::default() };
        let engine = SeedEngine::new(&idx, &opt);

        let query = idx.fetch(0, 30).unwrap();
        let mut arena = Arena::new();
        let hits = engine.search(&idx, &query, Orientation::Forward, &mut arena).unwrap();
        assert!(hits.narrow.is_empty());
        let symbolic = &hits.general[0];
        let interval = symbolic.redundant.unwrap();
        assert_eq!(interval.count, 4);
        assert_eq!(engine.locate(&idx, &interval, 2), Some(80));
        assert_eq!((symbolic.query_begin, symbolic.query_end), (0, 30));
    }
}
