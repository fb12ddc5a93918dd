//! Paired-end support.
//!
//! - `insert_size` - per-chunk insert size estimation and proper pair bounds
//! - `pairing` - mate fields, template length and paired mapping quality

pub mod insert_size;
pub mod pairing;
