//! Reference-agnostic alignment building blocks: the hit model, operation
//! sequences, the engine contract and the per-worker scratch arena.

pub mod cigar;
pub mod engine;
pub mod types;
pub mod workspace; // Per-worker scratch arena
