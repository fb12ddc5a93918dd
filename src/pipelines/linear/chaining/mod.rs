//! Chain resolver.
//!
//! Turns the raw per-orientation output of the alignment engine into one
//! finalized hit list per read:
//!
//! 1. chain filtering on the narrow hits (delegated to the engine)
//! 2. left then right extension of each surviving narrow hit
//! 3. merge into the general pool, re-expressing hits found on the reverse
//!    complement in read coordinates (`begin' = L - end`, `end' = L - begin`)
//! 4. duplicate and overlap resolution per orientation
//! 5. merge of both orientations, flagging hits found from both
//!
//! Every hit coming back from the engine is checked; an inconsistent one
//! fails the read's chunk.

use crate::core::alignment::engine::{AlignmentEngine, ExtendDirection};
use crate::core::alignment::types::{hit_flags, Hit, Orientation, OrientedHits};
use crate::core::alignment::workspace::Arena;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::error::PipelineError;
use crate::pipelines::linear::finalization::redundancy::remove_redundant_hits;

/// Checks an engine hit against the copy of the read it was found on.
fn check_engine_hit(
    hit: &Hit,
    read_len: i32,
    index: &ReferenceIndex,
    read_name: &str,
) -> Result<(), PipelineError> {
    hit.check_bounds(read_len)
        .map_err(|reason| PipelineError::engine(read_name, reason))?;
    if hit.score < 0 {
        return Err(PipelineError::engine(read_name, format!("negative score {}", hit.score)));
    }
    if !hit.is_symbolic() && hit.ref_end() > index.total_length {
        return Err(PipelineError::engine(
            read_name,
            format!(
                "hit [{}, {}) beyond reference length {}",
                hit.ref_start,
                hit.ref_end(),
                index.total_length
            ),
        ));
    }
    Ok(())
}

/// Steps 1-4 for one orientation.
///
/// `query` is the 2-bit copy the engine searched (the reverse complement for
/// [`Orientation::Reverse`]).
pub fn resolve_orientation<E: AlignmentEngine + ?Sized>(
    engine: &E,
    index: &ReferenceIndex,
    query: &[u8],
    raw: OrientedHits,
    arena: &mut Arena,
    read_name: &str,
    mask_level: f32,
) -> Result<Vec<Hit>, PipelineError> {
    let read_len = query.len() as i32;
    let OrientedHits { orientation, narrow, general } = raw;

    for hit in narrow.iter().chain(general.iter()) {
        check_engine_hit(hit, read_len, index, read_name)?;
    }

    let narrow = engine.filter_chains(narrow);
    let mut pool = general;
    pool.reserve(narrow.len());
    for hit in &narrow {
        let left = engine
            .extend(index, query, hit, ExtendDirection::Left, arena)
            .map_err(|e| e.into_pipeline(read_name))?;
        let extended = engine
            .extend(index, query, &left, ExtendDirection::Right, arena)
            .map_err(|e| e.into_pipeline(read_name))?;
        check_engine_hit(&extended, read_len, index, read_name)?;
        pool.push(extended);
    }

    let mut pool: Vec<Hit> = match orientation {
        Orientation::Forward => pool,
        Orientation::Reverse => pool.iter().map(|hit| hit.flipped(read_len)).collect(),
    };
    remove_redundant_hits(&mut pool, mask_level);
    Ok(pool)
}

/// Step 5: one final list from both orientations.
pub fn merge_orientations(forward: Vec<Hit>, reverse: Vec<Hit>, mask_level: f32) -> Vec<Hit> {
    let mut forward = forward;
    let mut reverse = reverse;
    for f in forward.iter_mut() {
        for r in reverse.iter_mut() {
            if f.same_locus(r) {
                f.flags |= hit_flags::BOTH_STRANDS;
                r.flags |= hit_flags::BOTH_STRANDS;
            }
        }
    }
    let mut merged = forward;
    merged.append(&mut reverse);
    remove_redundant_hits(&mut merged, mask_level);
    merged
}

/// Searches both copies of the read and resolves the hits.
pub fn resolve_read_hits<E: AlignmentEngine + ?Sized>(
    engine: &E,
    index: &ReferenceIndex,
    forward_query: &[u8],
    reverse_query: &[u8],
    arena: &mut Arena,
    read_name: &str,
    mask_level: f32,
) -> Result<Vec<Hit>, PipelineError> {
    let mut per_orientation: [Vec<Hit>; 2] = [Vec::new(), Vec::new()];
    for (slot, orientation) in per_orientation.iter_mut().zip(Orientation::BOTH) {
        let query = if orientation.is_reverse() { reverse_query } else { forward_query };
        let raw = engine
            .search(index, query, orientation, arena)
            .map_err(|e| e.into_pipeline(read_name))?;
        if raw.orientation != orientation {
            return Err(PipelineError::engine(
                read_name,
                format!("asked for {orientation:?} hits, got {:?}", raw.orientation),
            ));
        }
        log::trace!("{read_name}: {} raw {orientation:?} hits", raw.len());
        *slot = resolve_orientation(engine, index, query, raw, arena, read_name, mask_level)?;
    }
    let [forward, reverse] = per_orientation;
    Ok(merge_orientations(forward, reverse, mask_level))
}
