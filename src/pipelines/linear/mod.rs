//! Linear-reference post-processing pipeline.
//!
//! Raw per-orientation hits from an [`AlignmentEngine`] are resolved,
//! cigar-fixed, scored, paired and written as SAM, one chunk at a time.
//!
//! # Module Organization
//!
//! - `orchestrator/` - worker scheduler, per-read stage, chunk loop
//! - `chaining/` - chain resolver (duplicate/overlap resolution, strand merge)
//! - `region/` - cigar fixer and contig-boundary repair
//! - `finalization/` - redundancy pass, mapping quality, SAM flags and tags
//! - `paired/` - insert size estimation and mate pairing
//! - `engine/` - built-in exact-seed engine
//!
//! # Entry Point
//!
//! `mem::main_mem()` loads the reference and runs the chunk loop.
//!
//! [`AlignmentEngine`]: crate::core::alignment::engine::AlignmentEngine

pub mod chaining; // Chain resolver
pub mod engine; // Built-in seed engine
pub mod error; // Pipeline error taxonomy
pub mod finalization; // Redundancy, MAPQ, flags, tags
pub mod mem; // Main entry point
pub mod mem_opt; // Options
pub mod orchestrator; // Scheduling and chunk loop
pub mod paired; // Insert size and pairing
pub mod region; // Cigar fixer
