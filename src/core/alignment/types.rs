//! Hit model shared by the alignment engine and the post-processing stages.
//!
//! A [`Hit`] is a candidate placement of a read on the linear concatenated
//! reference. Engines report hits per search orientation inside an
//! [`OrientedHits`] value; the chain resolver turns both orientations into one
//! flat, strand-tagged list per read. Per-hit output produced later in the
//! pipeline lives in [`AuxRecord`], one-to-one with the surviving hits.

use super::cigar::CigarOp;

/// Which copy of the read a search ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The read as sequenced.
    Forward,
    /// The reverse complement of the read.
    Reverse,
}

impl Orientation {
    pub const BOTH: [Orientation; 2] = [Orientation::Forward, Orientation::Reverse];

    pub fn is_reverse(self) -> bool {
        matches!(self, Orientation::Reverse)
    }
}

/// Classification bits carried by a [`Hit`].
pub mod hit_flags {
    /// Another hit with the same coordinate, length and score was collapsed into this one.
    pub const DUPLICATE: u16 = 0x1;
    /// The hit lies in a region with many near-equal alternatives.
    pub const TANDEM_REPEAT: u16 = 0x2;
    /// The hit was recovered from the mate's placement.
    pub const MATE_RESCUE: u16 = 0x4;
    /// Reported as a secondary record.
    pub const SECONDARY: u16 = 0x8;
    /// An equivalent hit was found from both search orientations.
    pub const BOTH_STRANDS: u16 = 0x10;
    /// Locus chosen at random among equivalent candidates.
    pub const RANDOM_PICK: u16 = 0x20;
}

/// Symbolic entry standing for `count` equivalent loci that were not enumerated.
///
/// `key` is engine defined (for the built-in engine, the seed's k-mer code);
/// the engine resolves a rank within the interval back to a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedundantInterval {
    pub key: u64,
    pub count: u64,
}

/// A candidate placement of one read.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Leftmost coordinate on the forward concatenated reference.
    pub ref_start: u64,
    /// Reference bases covered by the alignment.
    pub ref_len: u64,
    /// Query interval `[query_begin, query_end)`.
    ///
    /// Engine output is relative to the searched sequence; after the chain
    /// resolver it is relative to the read as sequenced.
    pub query_begin: i32,
    pub query_end: i32,
    pub score: i32,
    /// Best competing score seen for this locus (0 if none).
    pub sub_score: i32,
    pub is_reverse: bool,
    /// Number of seeds supporting the hit.
    pub seed_support: i32,
    pub flags: u16,
    pub redundant: Option<RedundantInterval>,
}

impl Hit {
    pub fn new(ref_start: u64, ref_len: u64, query_begin: i32, query_end: i32, score: i32) -> Self {
        Self {
            ref_start,
            ref_len,
            query_begin,
            query_end,
            score,
            sub_score: 0,
            is_reverse: false,
            seed_support: 1,
            flags: 0,
            redundant: None,
        }
    }

    #[inline]
    pub fn query_len(&self) -> i32 {
        self.query_end - self.query_begin
    }

    #[inline]
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Symbolic redundant-interval entry that has not been pinned to a locus.
    #[inline]
    pub fn is_symbolic(&self) -> bool {
        self.redundant.is_some()
    }

    #[inline]
    pub fn ref_end(&self) -> u64 {
        self.ref_start + self.ref_len
    }

    /// Same reference coordinate, length and score. Symbolic entries must
    /// also stand for the same interval.
    pub fn same_locus(&self, other: &Hit) -> bool {
        self.ref_start == other.ref_start
            && self.ref_len == other.ref_len
            && self.score == other.score
            && self.redundant == other.redundant
    }

    /// Copy of this hit re-expressed on the opposite copy of the read.
    pub fn flipped(&self, read_len: i32) -> Hit {
        Hit {
            query_begin: read_len - self.query_end,
            query_end: read_len - self.query_begin,
            is_reverse: !self.is_reverse,
            ..self.clone()
        }
    }

    /// Query interval on the sequence actually aligned to the forward reference:
    /// the read itself for forward hits, its reverse complement otherwise.
    pub fn strand_interval(&self, read_len: i32) -> (usize, usize) {
        if self.is_reverse {
            ((read_len - self.query_end) as usize, (read_len - self.query_begin) as usize)
        } else {
            (self.query_begin as usize, self.query_end as usize)
        }
    }

    /// Checks `0 <= begin <= end <= read_len`.
    pub fn check_bounds(&self, read_len: i32) -> Result<(), String> {
        if self.query_begin < 0 || self.query_begin > self.query_end || self.query_end > read_len {
            return Err(format!(
                "query interval [{}, {}) outside read of length {}",
                self.query_begin, self.query_end, read_len
            ));
        }
        Ok(())
    }
}

/// Hits found by searching one copy of the read.
///
/// `narrow` holds uniquely seeded hits that still need chain filtering and
/// extension; `general` holds everything else, already final from the engine.
#[derive(Debug, Clone)]
pub struct OrientedHits {
    pub orientation: Orientation,
    pub narrow: Vec<Hit>,
    pub general: Vec<Hit>,
}

impl OrientedHits {
    pub fn empty(orientation: Orientation) -> Self {
        Self { orientation, narrow: Vec::new(), general: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.narrow.len() + self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where the mate of a read was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MateInfo {
    pub ref_id: usize,
    /// 0-based position on `ref_id`.
    pub pos: u64,
    pub is_reverse: bool,
}

/// Per-hit output data, one-to-one with the surviving hits of a read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxRecord {
    /// Repaired operation sequence including soft-clip padding.
    pub cigar: Vec<CigarOp>,
    pub edit_distance: i32,
    /// MD:Z string over the aligned part of `cigar`.
    pub md: String,
    pub mapq: u8,
    pub paired_mapq: u8,
    pub ref_id: usize,
    /// 0-based position on `ref_id`.
    pub local_pos: u64,
    pub mate: Option<MateInfo>,
    pub tlen: i64,
    pub ambiguous_bases: u32,
}

/// Paired-end context attached to a read after the join barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairContext {
    pub is_first: bool,
    pub proper_pair: bool,
    /// Placement of the mate's primary hit; `None` when the mate is unmapped.
    pub mate: Option<MateInfo>,
    /// Single-end quality of the mate's primary hit.
    pub mate_mapq: u8,
}

impl PairContext {
    pub fn mate_mapped(&self) -> bool {
        self.mate.is_some()
    }

    pub fn mate_reverse(&self) -> bool {
        self.mate.map(|m| m.is_reverse).unwrap_or(false)
    }
}

/// Everything the report emitter needs for one read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadAlignment {
    /// Surviving hits, primary first.
    pub hits: Vec<Hit>,
    pub aux: Vec<AuxRecord>,
    pub pair: Option<PairContext>,
    /// Set when the read itself was rejected; it is then reported unmapped.
    pub rejected: Option<String>,
}

impl ReadAlignment {
    pub fn unmapped() -> Self {
        Self::default()
    }

    pub fn is_mapped(&self) -> bool {
        !self.hits.is_empty()
    }

    pub fn primary(&self) -> Option<(&Hit, &AuxRecord)> {
        self.hits.first().zip(self.aux.first())
    }
}
