//! Hit finalization.
//!
//! - `redundancy` - duplicate and overlap resolution
//! - `mapq` - single-end and paired mapping quality
//! - `sam_flags` - SAM flag bit constants
//! - `tags` - XA:Z generation and the operation field

pub mod mapq;
pub mod redundancy;
pub mod sam_flags;
pub mod tags;

pub use mapq::{paired_mapq, single_end_mapq, MAX_MAPQ};
pub use redundancy::remove_redundant_hits;
pub use tags::{cigar_field, generate_xa_tag};
