//! Chunk processing and the run loop.
//!
//! ```text
//! Chunk -> scheduler fan-out (read_stage per read) -> join
//!       -> [paired] insert size + pairing -> SAM flush in input order
//! ```

use std::io::Write;
use std::time::Instant;

use super::read_stage::align_read;
use super::scheduler::WorkerScheduler;
use super::PipelineStatistics;
use crate::core::alignment::engine::AlignmentEngine;
use crate::core::alignment::types::ReadAlignment;
use crate::core::io::fastq_reader::{Chunk, ChunkReader, SequenceRecord};
use crate::core::io::sam_output::write_chunk;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::error::PipelineError;
use crate::pipelines::linear::mem_opt::MemOpt;
use crate::pipelines::linear::paired::insert_size::estimate_insert_size;
use crate::pipelines::linear::paired::pairing::pair_chunk;

/// A chunk after the per-read and cross-mate stages, ready to emit.
#[derive(Debug)]
pub struct ProcessedChunk {
    pub records: Vec<SequenceRecord>,
    pub results: Vec<ReadAlignment>,
    /// Reads discarded before processing (odd trailing read in paired mode).
    pub dropped: usize,
}

pub struct ChunkProcessor<'a, E: AlignmentEngine + ?Sized> {
    engine: &'a E,
    index: &'a ReferenceIndex,
    opt: &'a MemOpt,
    scheduler: WorkerScheduler,
}

impl<'a, E: AlignmentEngine + ?Sized> ChunkProcessor<'a, E> {
    pub fn new(engine: &'a E, index: &'a ReferenceIndex, opt: &'a MemOpt) -> Result<Self, PipelineError> {
        Ok(Self { engine, index, opt, scheduler: WorkerScheduler::new(opt.n_threads)? })
    }

    pub fn scheduler(&self) -> &WorkerScheduler {
        &self.scheduler
    }

    /// Runs every stage up to, but not including, emission.
    pub fn process(&mut self, chunk: Chunk) -> Result<ProcessedChunk, PipelineError> {
        let Chunk { mut records, paired, first_read_id } = chunk;

        let mut dropped = 0;
        if paired && records.len() % 2 == 1 {
            if let Some(last) = records.pop() {
                log::warn!(
                    "odd number of reads in paired mode; dropping the last read '{}'",
                    last.name
                );
                dropped = 1;
            }
        }

        let (engine, index, opt) = (self.engine, self.index, self.opt);
        let reads = &records;
        let mut results = self.scheduler.run(reads.len(), paired, |i, arena| {
            align_read(engine, index, opt, &reads[i], first_read_id + i as u64, arena)
        })?;

        if paired {
            let stats = estimate_insert_size(
                &results,
                index.total_length as i64,
                |hit| index.interval_contig(hit.ref_start, hit.ref_end()),
                opt.max_ins,
            );
            pair_chunk(&mut results, index, &stats);
        }

        Ok(ProcessedChunk { records, results, dropped })
    }

    /// Reads, processes and emits chunks until the input is exhausted.
    ///
    /// A chunk whose processing fails is skipped as a whole; errors that are
    /// fatal to the run are returned.
    pub fn run<W: Write>(
        &mut self,
        reader: &mut ChunkReader,
        writer: &mut W,
    ) -> Result<PipelineStatistics, PipelineError> {
        let start = Instant::now();
        let mut stats = PipelineStatistics::default();

        while let Some(chunk) = reader.next_chunk(self.opt.chunk_budget())? {
            let chunk_start = Instant::now();
            let n_reads = chunk.len();
            let n_bases = chunk.bases();
            stats.chunks += 1;
            stats.reads += n_reads;
            stats.bases += n_bases;

            let processed = match self.process(chunk) {
                Ok(processed) => processed,
                Err(e) if !e.is_fatal_to_run() => {
                    log::error!("chunk {} failed, no records written: {e}", stats.chunks);
                    stats.failed_chunks += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let emitted =
                write_chunk(writer, &processed.records, &processed.results, self.index, self.opt)?;
            stats.dropped_reads += processed.dropped;
            stats.records += emitted.records;
            stats.unmapped += emitted.unmapped;
            stats.rejected += processed.results.iter().filter(|r| r.rejected.is_some()).count();

            log::info!(
                "Processed {} reads ({} bp) in {:.3}s",
                n_reads,
                n_bases,
                chunk_start.elapsed().as_secs_f64()
            );
        }
        writer.flush()?;

        stats.wall_time_secs = start.elapsed().as_secs_f64();
        log::info!("{stats}");
        Ok(stats)
    }
}
