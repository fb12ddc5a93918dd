// Main entry point for the `mem` command
//
// Loads the reference, builds the seed engine, writes the SAM header and
// drives the chunk loop for single-end or paired-end input.

use anyhow::Result;
use crate::core::io::fastq_reader::ChunkReader;
use crate::core::io::sam_output::write_header;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::engine::SeedEngine;
use crate::pipelines::linear::mem_opt::{MemCliOptions, MemOpt};
use crate::pipelines::linear::orchestrator::{ChunkProcessor, PipelineStatistics};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Restores `<reference>.ann/.amb/.pac` when present, otherwise reads the
/// reference as FASTA.
pub fn load_reference(reference: &Path, opt: &MemOpt) -> Result<ReferenceIndex> {
    let pac = PathBuf::from(format!("{}.pac", reference.display()));
    let index = if pac.exists() {
        log::info!("Restoring reference index from prefix {}", reference.display());
        ReferenceIndex::restore(reference)
            .map_err(|e| anyhow::anyhow!("Error loading reference index {}: {}", reference.display(), e))?
    } else {
        log::info!("Reading reference FASTA {}", reference.display());
        let mut rng = StdRng::seed_from_u64(opt.seed);
        ReferenceIndex::from_fasta(reference, &mut rng)
            .map_err(|e| anyhow::anyhow!("Error reading reference {}: {}", reference.display(), e))?
    };
    log::info!(
        "Reference: {} contigs, {} bp, {} ambiguous runs",
        index.contigs.len(),
        index.total_length,
        index.ambiguous.len()
    );
    Ok(index)
}

/// Runs `mem` with options already translated by [`MemOpt::from_cli`].
pub fn main_mem(cli: &MemCliOptions, opt: &MemOpt, command_line: &str) -> Result<PipelineStatistics> {
    log::debug!("XA limits: {} primary, {} ALT", opt.max_xa_hits, opt.max_xa_hits_alt);
    log::info!(
        "Using {} worker(s), {} bases per chunk",
        opt.n_threads,
        opt.chunk_budget()
    );

    let index = load_reference(&cli.reference, opt)?;
    let engine = SeedEngine::new(&index, opt);

    let mut reader = match cli.reads.as_slice() {
        [single] => ChunkReader::single(single, opt.append_comment),
        [first, second] => ChunkReader::paired(first, second, opt.append_comment),
        other => return Err(anyhow::anyhow!("expected 1 or 2 read files, got {}", other.len())),
    }
    .map_err(|e| anyhow::anyhow!("Error opening read files: {}", e))?;
    log::info!(
        "{} mode",
        if reader.is_paired() { "Paired-end" } else { "Single-end" }
    );

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(file_name) => Box::new(BufWriter::new(File::create(file_name).map_err(|e| {
            anyhow::anyhow!("Error creating output file {}: {}", file_name.display(), e)
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    write_header(&mut writer, &index, opt, command_line)
        .map_err(|e| anyhow::anyhow!("Error writing SAM header: {}", e))?;

    let mut processor = ChunkProcessor::new(&engine, &index, opt)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let stats = processor
        .run(&mut reader, &mut writer)
        .map_err(|e| anyhow::anyhow!("Alignment failed: {}", e))?;
    Ok(stats)
}
