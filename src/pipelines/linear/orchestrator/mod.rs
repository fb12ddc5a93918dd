//! Pipeline orchestration layer
//!
//! - `scheduler` - deterministic read-to-worker assignment, join, scatter back
//! - `read_stage` - per-read resolve, cigar fixing and single-end quality
//! - `chunk` - chunk processing, pairing and the run loop

pub mod chunk;
pub mod read_stage;
pub mod scheduler;

use std::fmt;

pub use chunk::{ChunkProcessor, ProcessedChunk};
pub use scheduler::{worker_of, WorkerScheduler};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStatistics {
    pub chunks: usize,
    pub failed_chunks: usize,
    pub reads: usize,
    pub bases: usize,
    pub records: usize,
    pub unmapped: usize,
    /// Reads reported unmapped because they were invalid.
    pub rejected: usize,
    /// Odd trailing reads dropped in paired mode.
    pub dropped_reads: usize,
    pub wall_time_secs: f64,
}

impl fmt::Display for PipelineStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reads ({} bp) in {} chunks, {} records, {} unmapped, {} rejected, {} dropped, {} failed chunks, {:.2}s",
            self.reads,
            self.bases,
            self.chunks,
            self.records,
            self.unmapped,
            self.rejected,
            self.dropped_reads,
            self.failed_chunks,
            self.wall_time_secs
        )
    }
}
