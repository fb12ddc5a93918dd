//! Duplicate and overlap resolution over one read's hits.
//!
//! Hits are put in a total order (score descending, then coordinates) so the
//! pass is deterministic and idempotent: running it on its own output changes
//! nothing.

use std::cmp::Ordering;

use crate::core::alignment::types::{hit_flags, Hit};

/// Total order used by the resolver. Best score first.
pub fn hit_order(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.ref_start.cmp(&b.ref_start))
        .then_with(|| a.ref_len.cmp(&b.ref_len))
        .then_with(|| a.redundant.map(|r| r.key).cmp(&b.redundant.map(|r| r.key)))
        .then_with(|| a.query_begin.cmp(&b.query_begin))
        .then_with(|| a.query_end.cmp(&b.query_end))
        .then_with(|| a.is_reverse.cmp(&b.is_reverse))
}

/// Query-interval overlap length, 0 when disjoint.
#[inline]
fn query_overlap(a: &Hit, b: &Hit) -> i32 {
    (a.query_end.min(b.query_end) - a.query_begin.max(b.query_begin)).max(0)
}

/// Collapses duplicates, then drops hits redundant under the mask-level rule.
///
/// Duplicates share reference coordinate, length and score; one copy
/// survives flagged [`hit_flags::DUPLICATE`]. A hit whose query interval
/// overlaps a better (or equal, earlier-ordered) survivor by more than
/// `mask_level * min(len1, len2)` is dropped and its score becomes the
/// survivor's second-best score.
pub fn remove_redundant_hits(hits: &mut Vec<Hit>, mask_level: f32) {
    if hits.is_empty() {
        return;
    }
    hits.sort_by(hit_order);

    // Duplicates are adjacent under `hit_order`.
    let mut deduped: Vec<Hit> = Vec::with_capacity(hits.len());
    for hit in hits.drain(..) {
        match deduped.last_mut() {
            Some(kept) if kept.same_locus(&hit) => {
                kept.flags |= hit_flags::DUPLICATE | (hit.flags & hit_flags::BOTH_STRANDS);
                kept.seed_support = kept.seed_support.max(hit.seed_support);
                kept.sub_score = kept.sub_score.max(hit.sub_score);
                log::trace!("duplicate hit at {} collapsed", hit.ref_start);
            }
            _ => deduped.push(hit),
        }
    }

    let mut survivors: Vec<Hit> = Vec::with_capacity(deduped.len());
    'candidates: for hit in deduped {
        let len = hit.query_len();
        for kept in survivors.iter_mut() {
            let min_len = len.min(kept.query_len());
            if query_overlap(kept, &hit) as f32 > mask_level * min_len as f32 {
                kept.sub_score = kept.sub_score.max(hit.score);
                log::trace!(
                    "hit [{}, {}) score {} masked by [{}, {}) score {}",
                    hit.query_begin,
                    hit.query_end,
                    hit.score,
                    kept.query_begin,
                    kept.query_end,
                    kept.score
                );
                continue 'candidates;
            }
        }
        survivors.push(hit);
    }
    *hits = survivors;
}
