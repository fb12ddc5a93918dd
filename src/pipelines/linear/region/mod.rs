//! Reference-region handling: operation sequences for resolved hits and
//! repair of hits that cross a contig boundary.

pub mod cigar;

pub use cigar::{fix_hit_cigar, nm_and_md, repair_boundary, split_at_reference, symbolic_cigar, FixedCigar};
