//! Alignment operation sequences.
//!
//! Operations are kept as explicit `{kind, len}` pairs throughout the
//! pipeline. The textual form is produced only when a record is written.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarKind {
    Match,
    Ins,
    Del,
    SoftClip,
    HardClip,
}

impl CigarKind {
    pub fn as_char(self) -> char {
        match self {
            CigarKind::Match => 'M',
            CigarKind::Ins => 'I',
            CigarKind::Del => 'D',
            CigarKind::SoftClip => 'S',
            CigarKind::HardClip => 'H',
        }
    }

    #[inline]
    pub fn consumes_query(self) -> bool {
        matches!(self, CigarKind::Match | CigarKind::Ins | CigarKind::SoftClip)
    }

    #[inline]
    pub fn consumes_ref(self) -> bool {
        matches!(self, CigarKind::Match | CigarKind::Del)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    pub kind: CigarKind,
    pub len: u32,
}

impl CigarOp {
    pub const fn new(kind: CigarKind, len: u32) -> Self {
        Self { kind, len }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.as_char())
    }
}

/// Appends an operation, merging it into the last one when the kinds agree.
/// Zero-length operations are dropped.
pub fn push_op(ops: &mut Vec<CigarOp>, kind: CigarKind, len: u32) {
    if len == 0 {
        return;
    }
    match ops.last_mut() {
        Some(last) if last.kind == kind => last.len += len,
        _ => ops.push(CigarOp::new(kind, len)),
    }
}

pub fn reference_length(ops: &[CigarOp]) -> u64 {
    ops.iter()
        .filter(|op| op.kind.consumes_ref())
        .map(|op| op.len as u64)
        .sum()
}

pub fn query_length(ops: &[CigarOp]) -> u64 {
    ops.iter()
        .filter(|op| op.kind.consumes_query())
        .map(|op| op.len as u64)
        .sum()
}

/// Total length of `M` operations.
pub fn matched_length(ops: &[CigarOp]) -> u64 {
    ops.iter()
        .filter(|op| op.kind == CigarKind::Match)
        .map(|op| op.len as u64)
        .sum()
}

/// Textual CIGAR. With `hard_clip`, soft clips are written as `H`.
pub fn to_cigar_string(ops: &[CigarOp], hard_clip: bool) -> String {
    let mut out = String::with_capacity(ops.len() * 4);
    for op in ops {
        let kind = if hard_clip && op.kind == CigarKind::SoftClip {
            CigarKind::HardClip
        } else {
            op.kind
        };
        out.push_str(&op.len.to_string());
        out.push(kind.as_char());
    }
    out
}

/// Leading and trailing soft-clip lengths.
pub fn clip_lengths(ops: &[CigarOp]) -> (usize, usize) {
    let lead = match ops.first() {
        Some(op) if op.kind == CigarKind::SoftClip => op.len as usize,
        _ => 0,
    };
    let trail = match ops.last() {
        Some(op) if op.kind == CigarKind::SoftClip && ops.len() > 1 => op.len as usize,
        _ => 0,
    };
    (lead, trail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use CigarKind::*;

    #[test]
    fn push_merges_and_skips_empty() {
        let mut ops = Vec::new();
        push_op(&mut ops, SoftClip, 3);
        push_op(&mut ops, Match, 10);
        push_op(&mut ops, Match, 5);
        push_op(&mut ops, Del, 0);
        push_op(&mut ops, Ins, 2);
        assert_eq!(
            ops,
            vec![CigarOp::new(SoftClip, 3), CigarOp::new(Match, 15), CigarOp::new(Ins, 2)]
        );
    }

    #[test]
    fn lengths_by_consumption() {
        let ops = vec![
            CigarOp::new(SoftClip, 4),
            CigarOp::new(Match, 20),
            CigarOp::new(Del, 3),
            CigarOp::new(Ins, 2),
            CigarOp::new(Match, 10),
        ];
        assert_eq!(reference_length(&ops), 33);
        assert_eq!(query_length(&ops), 36);
        assert_eq!(matched_length(&ops), 30);
        assert_eq!(clip_lengths(&ops), (4, 0));
    }

    #[test]
    fn string_form_honours_hard_clip() {
        let ops = vec![CigarOp::new(SoftClip, 5), CigarOp::new(Match, 45)];
        assert_eq!(to_cigar_string(&ops, false), "5S45M");
        assert_eq!(to_cigar_string(&ops, true), "5H45M");
    }
}
