//! Contract between the post-processing pipeline and a seed-and-extend engine.
//!
//! The pipeline never looks inside the engine. It hands over a 2-bit encoded
//! query together with the worker's scratch [`Arena`], receives raw hits per
//! search orientation, and later asks for chain filtering, extension, an
//! operation sequence per hit and the loci behind symbolic entries.
//!
//! Implementations must be `Sync`: one engine value is shared by every worker.

use super::cigar::CigarOp;
use super::types::{Hit, Orientation, OrientedHits, RedundantInterval};
use super::workspace::Arena;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendDirection {
    Left,
    Right,
}

/// Operation sequence for one hit, without clip padding.
#[derive(Debug, Clone, PartialEq)]
pub struct CigarAlignment {
    pub ops: Vec<CigarOp>,
    pub score: i32,
    pub edit_distance: i32,
}

pub trait AlignmentEngine: Sync {
    /// Raw hits for one copy of the read.
    ///
    /// `query` is the 2-bit encoded copy for `orientation` (the reverse
    /// complement for [`Orientation::Reverse`]). Query intervals in the result
    /// are relative to that copy; `is_reverse` is left `false`.
    fn search(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        orientation: Orientation,
        arena: &mut Arena,
    ) -> Result<OrientedHits, EngineError>;

    /// Drops chains dominated by better ones. Only applied to narrow hits.
    fn filter_chains(&self, hits: Vec<Hit>) -> Vec<Hit>;

    /// Extends `hit` in one direction along the copy it was found on.
    fn extend(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        hit: &Hit,
        direction: ExtendDirection,
        arena: &mut Arena,
    ) -> Result<Hit, EngineError>;

    /// Aligns `query[begin..end]` against `[hit.ref_start, hit.ref_end())`.
    ///
    /// `query` is the copy aligned to the forward reference, i.e. the reverse
    /// complement when `hit.is_reverse`, and `begin..end` is the hit's interval
    /// on that copy.
    fn cigar(
        &self,
        index: &ReferenceIndex,
        query: &[u8],
        begin: usize,
        end: usize,
        hit: &Hit,
    ) -> Result<CigarAlignment, EngineError>;

    /// Coordinate of the `rank`-th locus collapsed into `interval`.
    fn locate(&self, index: &ReferenceIndex, interval: &RedundantInterval, rank: u64) -> Option<u64>;
}
