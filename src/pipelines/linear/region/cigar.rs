//! Cigar fixer.
//!
//! For every concrete hit, asks the engine for an operation sequence over the
//! hit's coordinates, pads the unaligned ends of the read with soft clips and
//! repairs alignments whose reference footprint runs off the end of a contig.
//!
//! Boundary repair splits the operations at the contig end into a
//! pre-boundary and a post-boundary candidate. Each candidate keeps every
//! query-consuming operation of the other side as a soft clip, so both still
//! cover the whole read. The candidate with more matched bases wins (the
//! pre-boundary one on ties) and the hit is narrowed to it.

use crate::core::alignment::cigar::{
    clip_lengths, matched_length, push_op, query_length, reference_length, CigarKind, CigarOp,
};
use crate::core::alignment::engine::AlignmentEngine;
use crate::core::alignment::types::Hit;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::error::PipelineError;

/// Operation sequence and edit distance for one hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCigar {
    pub ops: Vec<CigarOp>,
    pub edit_distance: i32,
    pub md: String,
    /// Whether boundary repair narrowed the hit.
    pub repaired: bool,
}

/// The two halves of an operation sequence split at a reference offset.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidates {
    pub before: Vec<CigarOp>,
    pub after: Vec<CigarOp>,
    /// Deletion bases trimmed from the start of `after`.
    pub after_lead_del: u64,
}

/// Splits `ops` at `cut` reference bases from the alignment start.
///
/// Query-consuming operations on the far side of the cut become soft clips;
/// deletions there are dropped.
pub fn split_at_reference(ops: &[CigarOp], cut: u64) -> SplitCandidates {
    let mut before = Vec::with_capacity(ops.len() + 1);
    let mut after = Vec::with_capacity(ops.len() + 1);
    let mut ref_pos = 0u64;

    for op in ops {
        let len = op.len as u64;
        let (left_part, right_part) = if op.kind.consumes_ref() {
            let left = cut.saturating_sub(ref_pos).min(len);
            (left, len - left)
        } else if ref_pos < cut {
            (len, 0)
        } else {
            (0, len)
        };
        if op.kind.consumes_ref() {
            ref_pos += len;
        }

        // Keep the op on its own side, clip it on the other.
        let clipped = if op.kind.consumes_query() { Some(CigarKind::SoftClip) } else { None };
        push_op(&mut before, op.kind, left_part as u32);
        if let Some(clip) = clipped {
            push_op(&mut before, clip, right_part as u32);
            push_op(&mut after, clip, left_part as u32);
        }
        push_op(&mut after, op.kind, right_part as u32);
    }

    let after_lead_del = normalize_edges(&mut after).0;
    normalize_edges(&mut before);
    SplitCandidates { before, after, after_lead_del }
}

/// Drops deletions and folds insertions into the clips at both edges of an
/// alignment. Returns the deletion bases removed at the start and the end.
fn normalize_edges(ops: &mut Vec<CigarOp>) -> (u64, u64) {
    let mut lead_del = 0u64;
    let mut trail_del = 0u64;

    // Leading: [S] (D|I)* ...
    let mut lead_clip = 0u32;
    let mut i = 0;
    while i < ops.len() {
        match ops[i].kind {
            CigarKind::SoftClip | CigarKind::Ins => lead_clip += ops[i].len,
            CigarKind::Del => lead_del += ops[i].len as u64,
            _ => break,
        }
        i += 1;
    }
    let mut tail: Vec<CigarOp> = ops.drain(i..).collect();

    let mut trail_clip = 0u32;
    while let Some(last) = tail.last() {
        match last.kind {
            CigarKind::SoftClip | CigarKind::Ins => trail_clip += last.len,
            CigarKind::Del => trail_del += last.len as u64,
            _ => break,
        }
        tail.pop();
    }

    ops.clear();
    push_op(ops, CigarKind::SoftClip, lead_clip);
    for op in tail {
        push_op(ops, op.kind, op.len);
    }
    push_op(ops, CigarKind::SoftClip, trail_clip);
    (lead_del, trail_del)
}

/// Narrows `hit` and `ops` until the footprint sits inside one contig.
///
/// Returns whether anything changed.
pub fn repair_boundary(index: &ReferenceIndex, hit: &mut Hit, ops: &mut Vec<CigarOp>) -> bool {
    let mut repaired = false;
    // Each round removes at least one contig from the footprint.
    for _ in 0..index.contigs.len() {
        let Some(contig_id) = index.contig_of(hit.ref_start) else {
            break;
        };
        let contig_end = index.contig(contig_id).end();
        if hit.ref_start + reference_length(ops) <= contig_end {
            break;
        }

        let cut = contig_end - hit.ref_start;
        let split = split_at_reference(ops, cut);
        let before_matched = matched_length(&split.before);
        let after_matched = matched_length(&split.after);
        log::debug!(
            "hit at {} crosses end of {} at {}: {} matched before, {} after",
            hit.ref_start,
            index.contig(contig_id).name,
            contig_end,
            before_matched,
            after_matched
        );

        if before_matched >= after_matched {
            *ops = split.before;
        } else {
            *ops = split.after;
            hit.ref_start = contig_end + split.after_lead_del;
        }
        hit.ref_len = reference_length(ops);
        repaired = true;
    }
    repaired
}

/// Edit distance and MD:Z string of `ops`, read off the reference and the
/// 2-bit query copy. Clips are skipped.
pub fn nm_and_md(index: &ReferenceIndex, query: &[u8], ref_start: u64, ops: &[CigarOp]) -> (i32, String) {
    let mut nm = 0i32;
    let mut md = String::with_capacity(ops.len() * 3 + 8);
    let mut run = 0u32;
    let mut q = 0usize;
    let mut r = ref_start;
    for op in ops {
        let len = op.len as usize;
        match op.kind {
            CigarKind::Match => {
                for k in 0..len {
                    let ref_base = index.base_at(r + k as u64);
                    if query.get(q + k).copied() == Some(ref_base) {
                        run += 1;
                    } else {
                        nm += 1;
                        md.push_str(&run.to_string());
                        md.push(base_char(ref_base));
                        run = 0;
                    }
                }
                q += len;
                r += len as u64;
            }
            CigarKind::Ins => {
                nm += len as i32;
                q += len;
            }
            CigarKind::Del => {
                nm += len as i32;
                md.push_str(&run.to_string());
                md.push('^');
                for k in 0..len {
                    md.push(base_char(index.base_at(r + k as u64)));
                }
                run = 0;
                r += len as u64;
            }
            CigarKind::SoftClip => q += len,
            CigarKind::HardClip => {}
        }
    }
    md.push_str(&run.to_string());
    (nm, md)
}

fn base_char(code: u8) -> char {
    b"ACGTN"[code.min(4) as usize] as char
}

/// Runs boundary repair over padded `ops` and narrows the query interval to
/// what survived.
fn repair_and_narrow(index: &ReferenceIndex, hit: &mut Hit, ops: &mut Vec<CigarOp>, read_len: i32) -> bool {
    hit.ref_len = reference_length(ops);
    let repaired = repair_boundary(index, hit, ops);
    if repaired {
        let (lead, trail) = clip_lengths(ops);
        let (qb, qe) = (lead as i32, read_len - trail as i32);
        if hit.is_reverse {
            hit.query_begin = read_len - qe;
            hit.query_end = read_len - qb;
        } else {
            hit.query_begin = qb;
            hit.query_end = qe;
        }
    }
    repaired
}

/// Produces the padded, boundary-repaired operation sequence for `hit`.
///
/// `strand_query` is the 2-bit copy of the read aligned to the forward
/// reference (the reverse complement for reverse hits). The hit's reference
/// interval and query interval are updated when repair narrows it.
pub fn fix_hit_cigar<E: AlignmentEngine + ?Sized>(
    engine: &E,
    index: &ReferenceIndex,
    strand_query: &[u8],
    hit: &mut Hit,
    read_name: &str,
) -> Result<FixedCigar, PipelineError> {
    let read_len = strand_query.len() as i32;
    let (begin, end) = hit.strand_interval(read_len);

    let aln = engine
        .cigar(index, strand_query, begin, end, hit)
        .map_err(|e| e.into_pipeline(read_name))?;
    if aln.ops.iter().any(|op| !matches!(op.kind, CigarKind::Match | CigarKind::Ins | CigarKind::Del)) {
        return Err(PipelineError::engine(read_name, "operation sequence contains clips"));
    }
    if query_length(&aln.ops) != (end - begin) as u64 {
        return Err(PipelineError::engine(
            read_name,
            format!(
                "operation sequence covers {} query bases, hit covers {}",
                query_length(&aln.ops),
                end - begin
            ),
        ));
    }

    let mut ops = Vec::with_capacity(aln.ops.len() + 2);
    push_op(&mut ops, CigarKind::SoftClip, begin as u32);
    for op in &aln.ops {
        push_op(&mut ops, op.kind, op.len);
    }
    push_op(&mut ops, CigarKind::SoftClip, (read_len as usize - end) as u32);

    let repaired = repair_and_narrow(index, hit, &mut ops, read_len);
    let (recomputed_nm, md) = nm_and_md(index, strand_query, hit.ref_start, &ops);
    let edit_distance = if repaired { recomputed_nm } else { aln.edit_distance };

    debug_assert_eq!(query_length(&ops), read_len as u64);
    Ok(FixedCigar { ops, edit_distance, md, repaired })
}

/// Operation sequence of a pinned symbolic hit: the hit's query interval as
/// one match run, padded with soft clips to the full read. No engine call.
pub fn symbolic_cigar(index: &ReferenceIndex, strand_query: &[u8], hit: &mut Hit) -> FixedCigar {
    let read_len = strand_query.len() as i32;
    let (begin, end) = hit.strand_interval(read_len);

    let mut ops = Vec::with_capacity(3);
    push_op(&mut ops, CigarKind::SoftClip, begin as u32);
    push_op(&mut ops, CigarKind::Match, (end - begin) as u32);
    push_op(&mut ops, CigarKind::SoftClip, (read_len as usize - end) as u32);

    let repaired = repair_and_narrow(index, hit, &mut ops, read_len);
    let (edit_distance, md) = nm_and_md(index, strand_query, hit.ref_start, &ops);
    FixedCigar { ops, edit_distance, md, repaired }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use CigarKind::*;

    fn op(kind: CigarKind, len: u32) -> CigarOp {
        CigarOp::new(kind, len)
    }

    fn index(lengths: &[usize]) -> ReferenceIndex {
        let seqs: Vec<(String, Vec<u8>)> = lengths
            .iter()
            .enumerate()
            .map(|(i, &l)| (format!("chr{}", i + 1), b"ACGT".iter().cycle().take(l).copied().collect()))
            .collect();
        let mut rng = StdRng::seed_from_u64(11);
        ReferenceIndex::from_sequences(seqs.iter().map(|(n, s)| (n.as_str(), s.as_slice())), &mut rng)
    }

    #[test]
    fn split_inside_match() {
        let split = split_at_reference(&[op(SoftClip, 2), op(Match, 20), op(SoftClip, 3)], 15);
        assert_eq!(split.before, vec![op(SoftClip, 2), op(Match, 15), op(SoftClip, 8)]);
        assert_eq!(split.after, vec![op(SoftClip, 17), op(Match, 5), op(SoftClip, 3)]);
        assert_eq!(split.after_lead_del, 0);
    }

    #[test]
    fn split_trims_edge_deletions_and_insertions() {
        let ops = [op(Match, 10), op(Del, 2), op(Match, 5), op(Ins, 1), op(Match, 4)];
        // Cut inside the deletion.
        let split = split_at_reference(&ops, 11);
        assert_eq!(split.before, vec![op(Match, 10), op(SoftClip, 10)]);
        assert_eq!(split.after, vec![op(SoftClip, 10), op(Match, 5), op(Ins, 1), op(Match, 4)]);
        assert_eq!(split.after_lead_del, 1);

        // Cut right before the insertion.
        let split = split_at_reference(&ops, 17);
        assert_eq!(split.before, vec![op(Match, 10), op(Del, 2), op(Match, 5), op(SoftClip, 5)]);
        assert_eq!(split.after, vec![op(SoftClip, 16), op(Match, 4)]);
    }

    #[test]
    fn repair_keeps_larger_side_and_preserves_query_length() {
        let idx = index(&[100, 100]);

        // 5 bases past the end of chr1: the pre-boundary side wins.
        let mut hit = Hit::new(75, 30, 0, 30, 30);
        let mut ops = vec![op(Match, 30)];
        assert!(repair_boundary(&idx, &mut hit, &mut ops));
        assert_eq!(ops, vec![op(Match, 25), op(SoftClip, 5)]);
        assert_eq!((hit.ref_start, hit.ref_len), (75, 25));
        assert_eq!(query_length(&ops), 30);

        // Mostly past the end: the post-boundary side wins.
        let mut hit = Hit::new(95, 30, 0, 30, 30);
        let mut ops = vec![op(Match, 30)];
        assert!(repair_boundary(&idx, &mut hit, &mut ops));
        assert_eq!(ops, vec![op(SoftClip, 5), op(Match, 25)]);
        assert_eq!((hit.ref_start, hit.ref_len), (100, 25));
    }

    #[test]
    fn repair_tie_prefers_pre_boundary() {
        let idx = index(&[100, 100]);
        let mut hit = Hit::new(90, 20, 0, 20, 20);
        let mut ops = vec![op(Match, 20)];
        repair_boundary(&idx, &mut hit, &mut ops);
        assert_eq!(ops, vec![op(Match, 10), op(SoftClip, 10)]);
        assert_eq!(hit.ref_start, 90);
    }

    #[test]
    fn repair_handles_footprint_over_several_contigs() {
        let idx = index(&[10, 5, 100]);
        let mut hit = Hit::new(8, 30, 0, 30, 30);
        let mut ops = vec![op(Match, 30)];
        assert!(repair_boundary(&idx, &mut hit, &mut ops));
        assert_eq!(idx.interval_contig(hit.ref_start, hit.ref_end()), Some(2));
        assert_eq!(ops, vec![op(SoftClip, 7), op(Match, 23)]);
        assert_eq!(query_length(&ops), 30);
    }

    #[test]
    fn no_repair_inside_contig() {
        let idx = index(&[100, 100]);
        let mut hit = Hit::new(10, 30, 0, 30, 30);
        let mut ops = vec![op(Match, 30)];
        assert!(!repair_boundary(&idx, &mut hit, &mut ops));
        assert_eq!(ops, vec![op(Match, 30)]);
    }

    #[test]
    fn nm_counts_mismatches_and_gaps() {
        let idx = index(&[40]);
        // Reference is ACGTACGT...; query has one mismatch at position 2.
        let query = [0u8, 1, 0, 3, 2, 0];
        let (nm, md) = nm_and_md(&idx, &query, 0, &[op(Match, 4), op(Ins, 1), op(Match, 1)]);
        assert_eq!(nm, 2);
        // G at reference offset 2 mismatched; the insertion leaves no MD entry.
        assert_eq!(md, "2G2");
    }

    #[test]
    fn md_perfect_match_and_clips() {
        let idx = index(&[40]);
        let query = [3u8, 0, 1, 2, 3, 0, 1, 3];
        // Clip of one base, then six matches starting at reference 0.
        let (nm, md) = nm_and_md(&idx, &query, 0, &[op(SoftClip, 1), op(Match, 6), op(SoftClip, 1)]);
        assert_eq!((nm, md.as_str()), (0, "6"));
    }

    #[test]
    fn md_marks_deletions_and_leading_mismatch() {
        let idx = index(&[40]);
        // ref ACGTACGT, query TCG + (deleted TA) + CGT
        let query = [3u8, 1, 2, 1, 2, 3];
        let (nm, md) = nm_and_md(&idx, &query, 0, &[op(Match, 3), op(Del, 2), op(Match, 3)]);
        assert_eq!(nm, 3);
        assert_eq!(md, "0A2^TA3");
    }

    #[test]
    fn symbolic_hit_is_padded_to_the_read() {
        let idx = index(&[100]);
        // 30 bases read, seed region [5, 30) at reference 8.
        let query: Vec<u8> = (0..30).map(|i| ((i + 3) % 4) as u8).collect();
        let mut hit = Hit::new(8, 25, 5, 30, 25);
        let fixed = symbolic_cigar(&idx, &query, &mut hit);
        assert_eq!(fixed.ops, vec![op(SoftClip, 5), op(Match, 25)]);
        assert_eq!(query_length(&fixed.ops), 30);
        assert_eq!((fixed.edit_distance, fixed.md.as_str()), (0, "25"));
        assert!(!fixed.repaired);

        // Reverse hit: the clip sits on the other side of the strand copy.
        let mut hit = Hit::new(8, 25, 5, 30, 25);
        hit.is_reverse = true;
        let fixed = symbolic_cigar(&idx, &query, &mut hit);
        assert_eq!(fixed.ops, vec![op(Match, 25), op(SoftClip, 5)]);
    }
}
