//! Sequence input and SAM output.

pub mod fastq_reader;
pub mod sam_output;
