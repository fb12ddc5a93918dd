// Insert size statistics module
//
// Estimated once per chunk from uniquely placed pairs:
// - Orientation detection (FF, FR, RF, RR)
// - Percentile / IQR bounds with outlier removal
// - Proper pair bounds per orientation, with an FR fallback of [1, max_ins]

use crate::core::alignment::types::{Hit, ReadAlignment};

const MIN_DIR_CNT: usize = 10; // Minimum pairs for orientation
const MIN_DIR_RATIO: f64 = 0.05; // Minimum ratio for orientation
const OUTLIER_BOUND: f64 = 2.0; // IQR multiplier for outliers
const MAPPING_BOUND: f64 = 3.0; // IQR multiplier for mapping
const MAX_STDDEV: f64 = 4.0; // Max standard deviations for boundaries
const MIN_RATIO: f64 = 0.8; // Second-best score above this fraction makes a hit non-unique

/// Orientation index of a forward/reverse pair.
pub const ORIENTATION_FR: usize = 1;

// Insert size statistics for one orientation
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSizeStats {
    pub avg: f64,     // Mean insert size
    pub std: f64,     // Standard deviation
    pub low: i64,     // Lower bound for proper pairs
    pub high: i64,    // Upper bound for proper pairs
    pub failed: bool, // Whether this orientation has enough data
}

impl Default for InsertSizeStats {
    fn default() -> Self {
        InsertSizeStats { avg: 0.0, std: 0.0, low: 0, high: 0, failed: true }
    }
}

/// Infer orientation of paired reads
/// Returns: (orientation, insert_size)
/// Orientation: 0=FF, 1=FR, 2=RF, 3=RR
pub fn infer_orientation(l_pac: i64, pos1: i64, pos2: i64) -> (usize, i64) {
    let r1 = if pos1 >= l_pac { 1 } else { 0 };
    let r2 = if pos2 >= l_pac { 1 } else { 0 };

    // p2 is the coordinate of read2 on the read1 strand
    let p2 = if r1 == r2 { pos2 } else { (l_pac << 1) - 1 - pos2 };

    let dist = if p2 > pos1 { p2 - pos1 } else { pos1 - p2 };
    let orientation = (if r1 == r2 { 0 } else { 1 }) ^ (if p2 > pos1 { 0 } else { 3 });

    (orientation, dist)
}

/// Position of a hit in the bidirectional space `[0, 2 * l_pac)`: the
/// leftmost base for forward hits, the mirrored rightmost base for reverse.
pub fn bidirectional_pos(l_pac: i64, hit: &Hit) -> i64 {
    if hit.is_reverse {
        let rightmost = (hit.ref_start + hit.ref_len) as i64 - 1;
        (l_pac << 1) - 1 - rightmost
    } else {
        hit.ref_start as i64
    }
}

/// Calculate insert size statistics for all 4 orientations
/// Returns: [InsertSizeStats; 4] for orientations FF, FR, RF, RR
pub fn calculate_insert_size_stats(
    l_pac: i64,
    pairs: &[(i64, i64)], // (pos1, pos2) for each pair
    max_ins: i64,
) -> [InsertSizeStats; 4] {
    let mut insert_sizes: [Vec<i64>; 4] = Default::default();

    for &(pos1, pos2) in pairs {
        let (orientation, dist) = infer_orientation(l_pac, pos1, pos2);
        if dist > 0 && dist <= max_ins {
            insert_sizes[orientation].push(dist);
        }
    }

    log::info!(
        "[PE] # candidate unique pairs for (FF, FR, RF, RR): ({}, {}, {}, {})",
        insert_sizes[0].len(),
        insert_sizes[1].len(),
        insert_sizes[2].len(),
        insert_sizes[3].len()
    );

    let mut stats: [InsertSizeStats; 4] = Default::default();

    for (d, sizes) in insert_sizes.iter_mut().enumerate() {
        let dir_name = ["FF", "FR", "RF", "RR"][d];

        if sizes.len() < MIN_DIR_CNT {
            log::info!("[PE] skip orientation {dir_name} as there are not enough pairs");
            continue;
        }

        log::info!("[PE] analyzing insert size distribution for orientation {dir_name}...");
        sizes.sort_unstable();

        let percentile = |p: f64| sizes[((p * sizes.len() as f64 + 0.499) as usize).min(sizes.len() - 1)];
        let p25 = percentile(0.25);
        let p50 = percentile(0.50);
        let p75 = percentile(0.75);
        let iqr = (p75 - p25) as f64;

        let low_outlier = (((p25 as f64 - OUTLIER_BOUND * iqr) + 0.499) as i64).max(1);
        let high_outlier = ((p75 as f64 + OUTLIER_BOUND * iqr) + 0.499) as i64;

        log::info!("[PE] (25, 50, 75) percentile: ({p25}, {p50}, {p75})");
        log::info!(
            "[PE] low and high boundaries for computing mean and std.dev: ({low_outlier}, {high_outlier})"
        );

        let kept: Vec<i64> = sizes
            .iter()
            .copied()
            .filter(|&s| s >= low_outlier && s <= high_outlier)
            .collect();
        if kept.is_empty() {
            log::warn!("[PE] no valid samples for orientation {dir_name} within bounds");
            continue;
        }
        let avg = kept.iter().sum::<i64>() as f64 / kept.len() as f64;
        let std = (kept.iter().map(|&s| (s as f64 - avg).powi(2)).sum::<f64>()
            / kept.len() as f64)
            .sqrt();

        log::info!("[PE] mean and std.dev: ({avg:.2}, {std:.2})");

        // Use the wider of the IQR and standard-deviation bounds.
        let mut low = ((p25 as f64 - MAPPING_BOUND * iqr) + 0.499) as i64;
        let mut high = ((p75 as f64 + MAPPING_BOUND * iqr) + 0.499) as i64;
        low = low.min((avg - MAX_STDDEV * std + 0.499) as i64).max(1);
        high = high.max((avg + MAX_STDDEV * std + 0.499) as i64);

        log::info!("[PE] low and high boundaries for proper pairs: ({low}, {high})");

        stats[d] = InsertSizeStats { avg, std, low, high, failed: false };
    }

    let max_count = insert_sizes.iter().map(|v| v.len()).max().unwrap_or(0);
    for (d, stat) in stats.iter_mut().enumerate() {
        if !stat.failed && (insert_sizes[d].len() as f64) < max_count as f64 * MIN_DIR_RATIO {
            stat.failed = true;
            log::debug!("[PE] skip orientation {} (insufficient ratio)", ["FF", "FR", "RF", "RR"][d]);
        }
    }

    stats
}

/// Estimates the chunk's insert-size distribution from pairs of reads
/// stored at positions `2i` and `2i + 1`.
///
/// Only pairs whose primaries are unique and on the same contig count. When
/// no orientation has enough samples, FR with `[1, max_ins]` is used.
pub fn estimate_insert_size(
    reads: &[ReadAlignment],
    l_pac: i64,
    contig_of: impl Fn(&Hit) -> Option<usize>,
    max_ins: i64,
) -> [InsertSizeStats; 4] {
    let mut position_pairs = Vec::with_capacity(reads.len() / 2);
    for pair in reads.chunks_exact(2) {
        let (Some(h1), Some(h2)) = (pair[0].hits.first(), pair[1].hits.first()) else {
            continue;
        };
        if h1.is_symbolic() || h2.is_symbolic() {
            continue;
        }
        if h1.sub_score as f64 > MIN_RATIO * h1.score as f64
            || h2.sub_score as f64 > MIN_RATIO * h2.score as f64
        {
            continue;
        }
        match (contig_of(h1), contig_of(h2)) {
            (Some(c1), Some(c2)) if c1 == c2 => {}
            _ => continue,
        }
        position_pairs.push((bidirectional_pos(l_pac, h1), bidirectional_pos(l_pac, h2)));
    }
    log::debug!("[PE] {} unique same-contig pairs in chunk", position_pairs.len());

    let mut stats = calculate_insert_size_stats(l_pac, &position_pairs, max_ins);
    if stats.iter().all(|s| s.failed) {
        log::info!("[PE] falling back to FR insert size bounds [1, {max_ins}]");
        stats[ORIENTATION_FR] = InsertSizeStats {
            avg: 0.0,
            std: 0.0,
            low: 1,
            high: max_ins,
            failed: false,
        };
    }
    stats
}
