//! Cross-mate stage for paired-end chunks.
//!
//! Runs single-threaded after the join barrier. For each pair it decides
//! whether the primaries are properly paired, fills in mate coordinates and
//! template lengths, and adjusts mapping qualities with the mate's evidence.

use super::insert_size::{bidirectional_pos, infer_orientation, InsertSizeStats};
use crate::core::alignment::types::{hit_flags, Hit, MateInfo, PairContext, ReadAlignment};
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::finalization::paired_mapq;

/// 5' end of a hit on the forward reference: leftmost base for forward hits,
/// one past the rightmost base for reverse hits.
#[inline]
pub fn pos5(hit: &Hit) -> i64 {
    if hit.is_reverse {
        hit.ref_end() as i64
    } else {
        hit.ref_start as i64
    }
}

/// Whether two primaries form a proper pair under `stats`.
pub fn is_proper_pair(
    index: &ReferenceIndex,
    stats: &[InsertSizeStats; 4],
    h1: &Hit,
    h2: &Hit,
) -> bool {
    if h1.is_symbolic() || h2.is_symbolic() {
        return false;
    }
    let same_contig = match (
        index.interval_contig(h1.ref_start, h1.ref_end()),
        index.interval_contig(h2.ref_start, h2.ref_end()),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    if !same_contig {
        return false;
    }
    let l_pac = index.total_length as i64;
    let (orientation, dist) =
        infer_orientation(l_pac, bidirectional_pos(l_pac, h1), bidirectional_pos(l_pac, h2));
    let s = &stats[orientation];
    !s.failed && dist >= s.low && dist <= s.high
}

fn mate_info(read: &ReadAlignment) -> Option<MateInfo> {
    read.primary().map(|(hit, aux)| MateInfo {
        ref_id: aux.ref_id,
        pos: aux.local_pos,
        is_reverse: hit.is_reverse,
    })
}

/// Fills mate fields, template lengths and paired qualities of one read.
fn apply_mate(
    read: &mut ReadAlignment,
    mate: &ReadAlignment,
    is_first: bool,
    proper_pair: bool,
) {
    let mate_primary = mate.primary().map(|(h, a)| (h.clone(), a.clone()));
    let mate_rescued = mate_primary
        .as_ref()
        .map(|(h, _)| h.has_flag(hit_flags::MATE_RESCUE))
        .unwrap_or(false);
    let mate_mapq = mate_primary.as_ref().map(|(_, a)| a.mapq).unwrap_or(0);
    let info = mate_info(mate);

    for (hit, aux) in read.hits.iter().zip(read.aux.iter_mut()) {
        aux.mate = info;
        aux.tlen = match &mate_primary {
            Some((mate_hit, mate_aux)) if mate_aux.ref_id == aux.ref_id => {
                pos5(mate_hit) - pos5(hit)
            }
            _ => 0,
        };
        aux.paired_mapq = if mate_primary.is_some() {
            paired_mapq(hit, aux.mapq, mate_mapq, proper_pair, mate_rescued)
        } else {
            aux.mapq
        };
    }

    read.pair = Some(PairContext { is_first, proper_pair, mate: info, mate_mapq });
}

/// Pairs reads `2i` and `2i + 1` of a chunk in place.
pub fn pair_chunk(reads: &mut [ReadAlignment], index: &ReferenceIndex, stats: &[InsertSizeStats; 4]) {
    let mut proper = 0usize;
    for pair in reads.chunks_exact_mut(2) {
        let (first, second) = pair.split_at_mut(1);
        let (r1, r2) = (&mut first[0], &mut second[0]);

        let proper_pair = match (r1.hits.first(), r2.hits.first()) {
            (Some(h1), Some(h2)) => is_proper_pair(index, stats, h1, h2),
            _ => false,
        };
        if proper_pair {
            proper += 1;
        }

        let r1_snapshot = r1.clone();
        apply_mate(r1, r2, true, proper_pair);
        apply_mate(r2, &r1_snapshot, false, proper_pair);
    }
    log::debug!("[PE] {} of {} pairs properly paired", proper, reads.len() / 2);
}
