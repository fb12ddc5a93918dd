//! XA:Z alternative-hit tag.
//!
//! Lists the hits that are not written as records of their own, as
//! `contig,±pos,CIGAR,NM;` entries. The tag is left off entirely when there
//! are more alternatives than the configured limit.

use crate::core::alignment::cigar::to_cigar_string;
use crate::core::alignment::types::{AuxRecord, Hit};
use crate::index::reference::ReferenceIndex;

/// Operation field of a record, `*` if there is no operation sequence.
pub fn cigar_field(aux: &AuxRecord, hard_clip: bool) -> String {
    if aux.cigar.is_empty() {
        "*".to_string()
    } else {
        to_cigar_string(&aux.cigar, hard_clip)
    }
}

fn xa_entry(index: &ReferenceIndex, hit: &Hit, aux: &AuxRecord) -> String {
    format!(
        "{},{}{},{},{}",
        index.contig(aux.ref_id).name,
        if hit.is_reverse { '-' } else { '+' },
        aux.local_pos + 1,
        cigar_field(aux, false),
        aux.edit_distance
    )
}

/// Value of the XA:Z tag for a read whose first `reported` hits get their
/// own records, or `None` if there is nothing to list or too much of it.
pub fn generate_xa_tag(
    index: &ReferenceIndex,
    hits: &[Hit],
    aux: &[AuxRecord],
    reported: usize,
    limit: i32,
) -> Option<String> {
    if reported >= hits.len() {
        return None;
    }
    let alternatives = hits.len() - reported;
    if limit <= 0 || alternatives > limit as usize {
        log::trace!("{alternatives} alternative hits exceed XA limit {limit}");
        return None;
    }
    let mut tag = String::new();
    for (hit, aux) in hits[reported..].iter().zip(&aux[reported..]) {
        tag.push_str(&xa_entry(index, hit, aux));
        tag.push(';');
    }
    Some(tag)
}
