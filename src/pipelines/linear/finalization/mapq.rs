//! Mapping quality.
//!
//! Single-end quality comes from the score margin over the best competing
//! hit, damped when the hit was seen from both strands or is supported by a
//! single seed. Paired quality starts from the single-end value and is then
//! moved by the mate's evidence.

use crate::core::alignment::types::{hit_flags, Hit};

pub const MAX_MAPQ: i32 = 250;

/// Floor applied to a mate-rescued hit before capping at the mate's quality.
const RESCUE_MAPQ_FLOOR: i32 = 20;
/// Bonus for a properly paired read.
const PROPER_PAIR_BONUS: i32 = 20;

/// Single-end mapping quality in `[0, 250]`.
///
/// `q = round(c * (score - subopt) * (250 / score + 0.03 / a))` with
/// `subopt = max(sub_score, min_score)`, `c` halved for hits found on both
/// strands and scaled by 0.2 for hits with fewer than two supporting seeds.
/// Symbolic and random-pick hits get 0.
pub fn single_end_mapq(hit: &Hit, min_score: i32, match_score: i32) -> u8 {
    if hit.is_symbolic() || hit.has_flag(hit_flags::RANDOM_PICK) || hit.score <= 0 {
        return 0;
    }
    let subopt = hit.sub_score.max(min_score);
    let mut c = 1.0f64;
    if hit.has_flag(hit_flags::BOTH_STRANDS) {
        c *= 0.5;
    }
    if hit.seed_support < 2 {
        c *= 0.2;
    }
    let epsilon = 0.03 / match_score.max(1) as f64;
    let q = c * (hit.score - subopt) as f64 * (250.0 / hit.score as f64 + epsilon);
    let q = if q <= 0.0 { 0 } else { (q + 0.499) as i32 };
    q.clamp(0, MAX_MAPQ) as u8
}

/// Paired mapping quality of one hit.
///
/// `own` and `mate` are the single-end qualities of this hit and of the
/// mate's primary hit. `proper_pair` and `mate_rescued` describe the pair.
pub fn paired_mapq(hit: &Hit, own: u8, mate: u8, proper_pair: bool, mate_rescued: bool) -> u8 {
    let own = own as i32;
    let mate = mate as i32;
    let mut pq = own;
    let rescued = hit.has_flag(hit_flags::MATE_RESCUE);

    if rescued && !hit.has_flag(hit_flags::TANDEM_REPEAT) {
        pq = pq.max(RESCUE_MAPQ_FLOOR).min(mate);
    }
    if proper_pair && !rescued && !mate_rescued {
        pq = own.max((pq + PROPER_PAIR_BONUS).min(mate));
    }
    pq.clamp(0, MAX_MAPQ) as u8
}
