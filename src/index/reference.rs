//! Read-only reference index.
//!
//! All contigs are laid end to end in one linear coordinate space and stored
//! 2-bit packed, four bases per byte, in the same layout as BWA's `.pac` file.
//! Ambiguous bases are recorded as runs and replaced by bases drawn from an
//! injected random source, so two builds with the same seed are identical.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use bio::io::fasta;
use rand::Rng;

use crate::core::utils::NST_NT4_TABLE;

/// One named sequence within the concatenated reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigAnnotation {
    pub name: String,
    pub anno: String,
    /// Offset of the first base in the linear reference.
    pub offset: u64,
    pub length: u64,
    pub ambiguous_count: u32,
    /// Alternate locus.
    pub is_alt: bool,
}

impl ContigAnnotation {
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Run of consecutive ambiguous bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousRun {
    pub offset: u64,
    pub length: u64,
    pub base: char,
}

#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    pub total_length: u64,
    pub contigs: Vec<ContigAnnotation>,
    pub ambiguous: Vec<AmbiguousRun>,
    pac: Vec<u8>,
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

/// Contigs named like `chr1_KI270762v1_alt` are alternate loci.
fn is_alt_name(name: &str) -> bool {
    name.ends_with("_alt")
}

impl ReferenceIndex {
    /// Builds the index from in-memory sequences.
    ///
    /// Ambiguous bases are recorded and then substituted with `rng`.
    pub fn from_sequences<'a, I, R>(records: I, rng: &mut R) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
        R: Rng + ?Sized,
    {
        let mut index = ReferenceIndex {
            total_length: 0,
            contigs: Vec::new(),
            ambiguous: Vec::new(),
            pac: Vec::new(),
        };
        for (name, seq) in records {
            index.push_contig(name, "", seq, rng);
        }
        index
    }

    /// Builds the index from a FASTA file.
    pub fn from_fasta<R: Rng + ?Sized>(path: &Path, rng: &mut R) -> io::Result<Self> {
        let reader = fasta::Reader::from_file(path).map_err(|e| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}: {e}", path.display()))
        })?;
        let mut index = ReferenceIndex {
            total_length: 0,
            contigs: Vec::new(),
            ambiguous: Vec::new(),
            pac: Vec::new(),
        };
        for record in reader.records() {
            let record = record.map_err(invalid_data_from)?;
            index.push_contig(record.id(), record.desc().unwrap_or(""), record.seq(), rng);
        }
        if index.contigs.is_empty() {
            return Err(invalid_data(format!("{}: no sequences", path.display())));
        }
        log::info!(
            "Loaded reference {}: {} contigs, {} bp, {} ambiguous runs",
            path.display(),
            index.contigs.len(),
            index.total_length,
            index.ambiguous.len()
        );
        Ok(index)
    }

    fn push_contig<R: Rng + ?Sized>(&mut self, name: &str, anno: &str, seq: &[u8], rng: &mut R) {
        let offset = self.total_length;
        let mut ambiguous_count = 0u32;
        for &base in seq {
            let pos = self.total_length;
            let mut code = NST_NT4_TABLE[base as usize];
            if code >= 4 {
                match self.ambiguous.last_mut() {
                    Some(run) if run.offset + run.length == pos => run.length += 1,
                    _ => self.ambiguous.push(AmbiguousRun {
                        offset: pos,
                        length: 1,
                        base: base as char,
                    }),
                }
                ambiguous_count += 1;
                code = rng.gen_range(0..4);
            }
            let byte = (pos >> 2) as usize;
            if self.pac.len() <= byte {
                self.pac.push(0);
            }
            self.pac[byte] |= code << ((!pos & 3) << 1);
            self.total_length += 1;
        }
        self.contigs.push(ContigAnnotation {
            name: name.to_string(),
            anno: anno.to_string(),
            offset,
            length: seq.len() as u64,
            ambiguous_count,
            is_alt: is_alt_name(name),
        });
    }

    /// Restores an index from BWA's `<prefix>.ann`, `<prefix>.amb` and
    /// `<prefix>.pac`. A `<prefix>.alt` file, when present, marks ALT contigs.
    pub fn restore(prefix: &Path) -> io::Result<Self> {
        let ann_path = with_suffix(prefix, ".ann");
        let mut lines = BufReader::new(File::open(&ann_path)?).lines();

        let header = next_line(&mut lines, ".ann header")?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(invalid_data("malformed .ann header"));
        }
        let total_length: u64 = parse_field(fields[0], "l_pac")?;
        let n_seqs: usize = parse_field(fields[1], "n_seqs")?;

        let mut contigs = Vec::with_capacity(n_seqs);
        for _ in 0..n_seqs {
            let name_line = next_line(&mut lines, ".ann name line")?;
            let mut parts = name_line.splitn(3, ' ');
            let _gi = parts.next();
            let name = parts
                .next()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| invalid_data("missing contig name in .ann"))?
                .to_string();
            let anno = match parts.next() {
                Some(a) if a != "(null)" => a.to_string(),
                _ => String::new(),
            };

            let coord_line = next_line(&mut lines, ".ann coordinate line")?;
            let coords: Vec<&str> = coord_line.split_whitespace().collect();
            if coords.len() < 3 {
                return Err(invalid_data(format!("malformed .ann entry for {name}")));
            }
            contigs.push(ContigAnnotation {
                is_alt: is_alt_name(&name),
                name,
                anno,
                offset: parse_field(coords[0], "offset")?,
                length: parse_field(coords[1], "len")?,
                ambiguous_count: parse_field(coords[2], "n_ambs")?,
            });
        }

        let amb_path = with_suffix(prefix, ".amb");
        let mut amb_lines = BufReader::new(File::open(&amb_path)?).lines();
        let amb_header = next_line(&mut amb_lines, ".amb header")?;
        let n_holes: usize = amb_header
            .split_whitespace()
            .nth(2)
            .ok_or_else(|| invalid_data("malformed .amb header"))
            .and_then(|f| parse_field(f, "n_holes"))?;
        let mut ambiguous = Vec::with_capacity(n_holes);
        for _ in 0..n_holes {
            let line = next_line(&mut amb_lines, ".amb entry")?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(invalid_data("malformed .amb entry"));
            }
            ambiguous.push(AmbiguousRun {
                offset: parse_field(parts[0], "offset")?,
                length: parse_field(parts[1], "len")?,
                base: parts[2].chars().next().unwrap_or('N'),
            });
        }

        let mut pac = Vec::new();
        File::open(with_suffix(prefix, ".pac"))?.read_to_end(&mut pac)?;
        let needed = total_length.div_ceil(4) as usize;
        if pac.len() < needed {
            return Err(invalid_data(format!(
                ".pac holds {} bytes, {} required for {} bases",
                pac.len(),
                needed,
                total_length
            )));
        }
        pac.truncate(needed);

        let alt_path = with_suffix(prefix, ".alt");
        if alt_path.exists() {
            let alt_names = read_alt_names(&alt_path)?;
            for contig in &mut contigs {
                contig.is_alt = alt_names.contains(contig.name.as_str());
            }
            log::info!("Read {} ALT contigs", alt_names.len());
        }

        Ok(ReferenceIndex { total_length, contigs, ambiguous, pac })
    }

    #[inline]
    pub fn contig(&self, id: usize) -> &ContigAnnotation {
        &self.contigs[id]
    }

    /// Contig holding linear position `pos`.
    pub fn contig_of(&self, pos: u64) -> Option<usize> {
        if pos >= self.total_length {
            return None;
        }
        let idx = self.contigs.partition_point(|c| c.end() <= pos);
        (idx < self.contigs.len()).then_some(idx)
    }

    /// Contig holding the whole of `[beg, end)`, or `None` if the interval
    /// is empty, out of range or crosses a contig boundary.
    pub fn interval_contig(&self, beg: u64, end: u64) -> Option<usize> {
        if beg >= end {
            return None;
        }
        let id = self.contig_of(beg)?;
        (end <= self.contigs[id].end()).then_some(id)
    }

    /// Number of ambiguous reference bases within `[beg, beg + len)`.
    pub fn count_ambiguous(&self, beg: u64, len: u64) -> u32 {
        let end = beg + len;
        let first = self.ambiguous.partition_point(|run| run.offset + run.length <= beg);
        self.ambiguous[first..]
            .iter()
            .take_while(|run| run.offset < end)
            .map(|run| (run.offset + run.length).min(end) - run.offset.max(beg))
            .sum::<u64>() as u32
    }

    /// 2-bit code (0..4) of the base at `pos`.
    #[inline]
    pub fn base_at(&self, pos: u64) -> u8 {
        (self.pac[(pos >> 2) as usize] >> ((!pos & 3) << 1)) & 3
    }

    /// Copies `out.len()` bases starting at `beg` into `out`.
    pub fn fetch_into(&self, beg: u64, out: &mut [u8]) -> Result<(), String> {
        let end = beg + out.len() as u64;
        if end > self.total_length {
            return Err(format!(
                "reference window [{beg}, {end}) exceeds reference length {}",
                self.total_length
            ));
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.base_at(beg + i as u64);
        }
        Ok(())
    }

    pub fn fetch(&self, beg: u64, len: u64) -> Result<Vec<u8>, String> {
        let mut out = vec![0u8; len as usize];
        self.fetch_into(beg, &mut out)?;
        Ok(out)
    }
}

fn invalid_data_from(e: impl std::fmt::Display) -> io::Error {
    invalid_data(e.to_string())
}

fn next_line<B: BufRead>(lines: &mut io::Lines<B>, what: &str) -> io::Result<String> {
    lines.next().ok_or_else(|| invalid_data(format!("missing {what}")))?
}

fn parse_field<T: std::str::FromStr>(s: &str, what: &str) -> io::Result<T> {
    s.parse().map_err(|_| invalid_data(format!("invalid {what}: '{s}'")))
}

fn read_alt_names(path: &Path) -> io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if line.starts_with('@') {
            continue;
        }
        if let Some(name) = line.split_whitespace().next() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn two_contigs() -> ReferenceIndex {
        let mut rng = StdRng::seed_from_u64(11);
        ReferenceIndex::from_sequences(
            [("chr1", &b"ACGTACGTNNAC"[..]), ("chr2_alt", &b"GGGGCCCC"[..])],
            &mut rng,
        )
    }

    #[test]
    fn contig_lookup() {
        let idx = two_contigs();
        assert_eq!(idx.total_length, 20);
        assert_eq!(idx.contig_of(0), Some(0));
        assert_eq!(idx.contig_of(11), Some(0));
        assert_eq!(idx.contig_of(12), Some(1));
        assert_eq!(idx.contig_of(20), None);
        assert!(idx.contig(1).is_alt);
        assert!(!idx.contig(0).is_alt);
    }

    #[test]
    fn interval_crossing_contigs_is_rejected() {
        let idx = two_contigs();
        assert_eq!(idx.interval_contig(2, 12), Some(0));
        assert_eq!(idx.interval_contig(10, 14), None);
        assert_eq!(idx.interval_contig(12, 20), Some(1));
        assert_eq!(idx.interval_contig(5, 5), None);
    }

    #[test]
    fn ambiguous_bases_are_recorded_and_counted() {
        let idx = two_contigs();
        assert_eq!(idx.ambiguous, vec![AmbiguousRun { offset: 8, length: 2, base: 'N' }]);
        assert_eq!(idx.contig(0).ambiguous_count, 2);
        assert_eq!(idx.count_ambiguous(0, 8), 0);
        assert_eq!(idx.count_ambiguous(0, 9), 1);
        assert_eq!(idx.count_ambiguous(9, 5), 1);
        assert_eq!(idx.count_ambiguous(0, 20), 2);
    }

    #[test]
    fn packed_bases_round_trip() {
        let idx = two_contigs();
        assert_eq!(idx.fetch(0, 8).unwrap(), vec![0, 1, 2, 3, 0, 1, 2, 3]);
        assert_eq!(idx.fetch(12, 8).unwrap(), vec![2, 2, 2, 2, 1, 1, 1, 1]);
        assert!(idx.fetch(18, 5).is_err());
    }

    #[test]
    fn same_seed_same_substitution() {
        let a = two_contigs();
        let b = two_contigs();
        assert_eq!(a.fetch(8, 2).unwrap(), b.fetch(8, 2).unwrap());
    }

    #[test]
    fn restores_bwa_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("ref.fa");

        let mut ann = File::create(with_suffix(&prefix, ".ann")).unwrap();
        writeln!(ann, "12 2 11").unwrap();
        writeln!(ann, "0 chrA (null)").unwrap();
        writeln!(ann, "0 8 0").unwrap();
        writeln!(ann, "0 chrB some description").unwrap();
        writeln!(ann, "8 4 1").unwrap();
        let mut amb = File::create(with_suffix(&prefix, ".amb")).unwrap();
        writeln!(amb, "12 2 1").unwrap();
        writeln!(amb, "10 1 N").unwrap();
        // ACGTACGT GGCC + count byte
        File::create(with_suffix(&prefix, ".pac"))
            .unwrap()
            .write_all(&[0b00011011, 0b00011011, 0b10100101, 0])
            .unwrap();
        let mut alt = File::create(with_suffix(&prefix, ".alt")).unwrap();
        writeln!(alt, "@SQ\tSN:chrB\tLN:4").unwrap();
        writeln!(alt, "chrB\t0\tchrA\t1\t0\t4M\t*\t0\t0\t*\t*").unwrap();

        let idx = ReferenceIndex::restore(&prefix).unwrap();
        assert_eq!(idx.total_length, 12);
        assert_eq!(idx.contigs.len(), 2);
        assert_eq!(idx.contig(1).anno, "some description");
        assert_eq!(idx.contig(0).anno, "");
        assert!(idx.contig(1).is_alt);
        assert_eq!(idx.count_ambiguous(8, 4), 1);
        assert_eq!(idx.fetch(6, 6).unwrap(), vec![2, 3, 2, 2, 1, 1]);
    }
}
