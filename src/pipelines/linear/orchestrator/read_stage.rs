//! Per-read stage run by each worker.
//!
//! resolve -> pin symbolic entries -> fix cigars (NM, MD) -> single-end quality.
//! A read is finished only when all of it succeeds; invalid reads come back
//! as rejected (reported unmapped), engine failures propagate to the chunk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::alignment::engine::AlignmentEngine;
use crate::core::alignment::types::{hit_flags, AuxRecord, Hit, ReadAlignment};
use crate::core::alignment::workspace::Arena;
use crate::core::io::fastq_reader::SequenceRecord;
use crate::core::utils::{encode_query, hash_64, reverse_complement_codes};
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::chaining::resolve_read_hits;
use crate::pipelines::linear::error::PipelineError;
use crate::pipelines::linear::finalization::single_end_mapq;
use crate::pipelines::linear::mem_opt::MemOpt;
use crate::pipelines::linear::region::{fix_hit_cigar, symbolic_cigar};

/// Random source of one read. Depends only on the run seed and the read's
/// position in the input, never on which worker handles it.
pub fn read_rng(seed: u64, read_id: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ hash_64(read_id))
}

fn validate_read(record: &SequenceRecord) -> Result<(), PipelineError> {
    if record.is_empty() {
        return Err(PipelineError::invalid_input(&record.name, "empty sequence"));
    }
    if record.len() > i32::MAX as usize {
        return Err(PipelineError::invalid_input(&record.name, "sequence too long"));
    }
    if let Some(qual) = &record.qual {
        if qual.len() != record.len() {
            return Err(PipelineError::invalid_input(
                &record.name,
                format!("{} quality values for {} bases", qual.len(), record.len()),
            ));
        }
    }
    Ok(())
}

/// Pins a symbolic entry to one of its loci, chosen at random.
fn pin_symbolic<E: AlignmentEngine + ?Sized, R: Rng>(
    engine: &E,
    index: &ReferenceIndex,
    hit: &mut Hit,
    rng: &mut R,
    read_name: &str,
) -> Result<(), PipelineError> {
    let Some(interval) = hit.redundant else {
        return Ok(());
    };
    if interval.count == 0 {
        return Err(PipelineError::engine(read_name, "empty redundant interval"));
    }
    let rank = rng.gen_range(0..interval.count);
    let pos = engine
        .locate(index, &interval, rank)
        .ok_or_else(|| PipelineError::engine(read_name, format!("no locus for rank {rank}")))?;
    hit.ref_start = pos;
    hit.ref_len = hit.query_len() as u64;
    hit.flags |= hit_flags::RANDOM_PICK;
    if hit.ref_end() > index.total_length {
        return Err(PipelineError::engine(
            read_name,
            format!("pinned locus {pos} runs past the reference end"),
        ));
    }
    log::trace!("{read_name}: symbolic entry of {} loci pinned to {pos}", interval.count);
    Ok(())
}

fn map_read<E: AlignmentEngine + ?Sized>(
    engine: &E,
    index: &ReferenceIndex,
    opt: &MemOpt,
    record: &SequenceRecord,
    read_id: u64,
    arena: &mut Arena,
) -> Result<ReadAlignment, PipelineError> {
    validate_read(record)?;
    let name = record.name.as_str();

    arena.ensure(record.len()).map_err(|e| e.into_pipeline(name))?;

    let mut rng = read_rng(opt.seed, read_id);
    let (forward, substituted) = encode_query(&record.seq, &mut rng);
    if substituted > 0 {
        log::trace!("{name}: {substituted} ambiguous bases substituted");
    }
    let reverse = reverse_complement_codes(&forward);

    let mut hits = resolve_read_hits(engine, index, &forward, &reverse, arena, name, opt.mask_level)?;
    hits.retain(|h| h.score >= opt.t);

    let mut aux = Vec::with_capacity(hits.len());
    for hit in hits.iter_mut() {
        let strand_query = if hit.is_reverse { &reverse } else { &forward };
        let fixed = if hit.is_symbolic() {
            pin_symbolic(engine, index, hit, &mut rng, name)?;
            symbolic_cigar(index, strand_query, hit)
        } else {
            fix_hit_cigar(engine, index, strand_query, hit, name)?
        };
        let mut record_aux = AuxRecord {
            cigar: fixed.ops,
            edit_distance: fixed.edit_distance,
            md: fixed.md,
            ..Default::default()
        };

        let ref_id = index
            .contig_of(hit.ref_start)
            .ok_or_else(|| PipelineError::engine(name, format!("hit at {} outside reference", hit.ref_start)))?;
        record_aux.ref_id = ref_id;
        record_aux.local_pos = hit.ref_start - index.contig(ref_id).offset;
        record_aux.ambiguous_bases = index.count_ambiguous(hit.ref_start, hit.ref_len);
        record_aux.mapq = single_end_mapq(hit, opt.t, opt.a);
        aux.push(record_aux);
    }

    let reported = hits.len().min(1 + opt.max_secondary);
    for hit in hits.iter_mut().take(reported).skip(1) {
        hit.flags |= hit_flags::SECONDARY;
    }
    log::trace!("{name}: {} hits, {} reported", hits.len(), reported);

    Ok(ReadAlignment { hits, aux, pair: None, rejected: None })
}

/// Runs the per-read stage. Invalid reads are reported unmapped.
pub fn align_read<E: AlignmentEngine + ?Sized>(
    engine: &E,
    index: &ReferenceIndex,
    opt: &MemOpt,
    record: &SequenceRecord,
    read_id: u64,
    arena: &mut Arena,
) -> Result<ReadAlignment, PipelineError> {
    match map_read(engine, index, opt, record, read_id, arena) {
        Err(e) if !e.is_fatal_to_chunk() => {
            log::warn!("{e}");
            Ok(ReadAlignment { rejected: Some(e.to_string()), ..ReadAlignment::unmapped() })
        }
        other => other,
    }
}
