// src/defaults.rs

// Engine Constants
pub const MIN_SEED_LEN: i32 = 19;
pub const MAX_OCCURRENCES: i32 = 500;
pub const DROP_CHAIN_FRACTION: f32 = 0.50;

// Scoring Constants
pub const MATCH_SCORE: i32 = 1;
pub const MISMATCH_PENALTY: i32 = 4;

// Post-processing Constants
pub const MIN_SCORE: i32 = 30;
pub const MASK_LEVEL: f32 = 0.50;
pub const MAX_INSERT: i64 = 10_000;

// Output Constants
pub const MAX_XA_HITS: i32 = 5;
pub const MAX_XA_HITS_ALT: i32 = 200;
pub const MAX_XA_HITS_STR: &str = "5,200";

// Other Constants
pub const CHUNK_SIZE: usize = 10_000_000;
pub const RANDOM_SEED: u64 = 11;
pub const VERBOSITY: i32 = 3;
