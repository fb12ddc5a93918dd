// Chunk reader built on bio::io::fastq / bio::io::fasta
//
// - Automatic gzip/bgzip detection by file extension and magic bytes
// - Parallel BGZIP decompression when the BGZIP header is present
// - FASTQ or FASTA detected from the first record marker
// - Chunks bounded by a base-count budget; paired input is interleaved so that
//   records 2i and 2i+1 are mates

use bio::io::{fasta, fastq};
use flate2::read::GzDecoder;
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// One input read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceRecord {
    pub name: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
    pub comment: Option<String>,
}

impl SequenceRecord {
    pub fn new(name: &str, seq: &[u8], qual: Option<&[u8]>) -> Self {
        Self {
            name: name.to_string(),
            seq: seq.to_vec(),
            qual: qual.map(<[u8]>::to_vec),
            comment: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Ordered batch of reads handed to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub records: Vec<SequenceRecord>,
    pub paired: bool,
    /// Run-wide index of `records[0]`.
    pub first_read_id: u64,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bases(&self) -> usize {
        self.records.iter().map(SequenceRecord::len).sum()
    }
}

/// Detect if a gzipped file is BGZIP format by checking for BGZIP-specific header
fn is_bgzip_format(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 18];
    if file.read(&mut header).unwrap_or(0) < 18 {
        return Ok(false);
    }
    // gzip magic, FEXTRA flag, then the 'BC' subfield
    Ok(header[0] == 0x1f
        && header[1] == 0x8b
        && header[3] & 0x04 != 0
        && header[12] == b'B'
        && header[13] == b'C')
}

fn open_decompressed(path: &Path) -> io::Result<BufReader<Box<dyn Read + Send>>> {
    let file = File::open(path)?;
    let inner: Box<dyn Read + Send> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        if is_bgzip_format(path)? {
            log::debug!("{}: BGZIP, using parallel decompression", path.display());
            Box::new(bgzf::MultithreadedReader::new(file))
        } else {
            log::debug!("{}: gzip, using single-threaded decompression", path.display());
            Box::new(GzDecoder::new(file))
        }
    } else {
        Box::new(file)
    };
    Ok(BufReader::with_capacity(BUFFER_SIZE, inner))
}

type Stream = BufReader<Box<dyn Read + Send>>;

enum Records {
    Fastq(fastq::Records<Stream>),
    Fasta(fasta::Records<Stream>),
}

/// Sequence reader over one FASTQ or FASTA file.
pub struct FastqReader {
    records: Records,
    path: PathBuf,
    keep_comments: bool,
}

impl FastqReader {
    pub fn open(path: &Path, keep_comments: bool) -> io::Result<Self> {
        let mut stream = open_decompressed(path)?;
        let is_fasta = stream.fill_buf()?.first() == Some(&b'>');
        let records = if is_fasta {
            Records::Fasta(fasta::Reader::from_bufread(stream).records())
        } else {
            Records::Fastq(fastq::Reader::from_bufread(stream).records())
        };
        Ok(Self { records, path: path.to_path_buf(), keep_comments })
    }

    fn parse_error(&self, e: impl std::fmt::Display) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, format!("{}: {e}", self.path.display()))
    }

    /// Next record, or `None` at end of input.
    pub fn next_record(&mut self) -> io::Result<Option<SequenceRecord>> {
        let record = match &mut self.records {
            Records::Fastq(records) => match records.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(self.parse_error(e)),
                Some(Ok(r)) => SequenceRecord {
                    name: r.id().to_string(),
                    seq: r.seq().to_vec(),
                    qual: Some(r.qual().to_vec()).filter(|q| !q.is_empty()),
                    comment: r.desc().map(str::to_string),
                },
            },
            Records::Fasta(records) => match records.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(self.parse_error(e)),
                Some(Ok(r)) => SequenceRecord {
                    name: r.id().to_string(),
                    seq: r.seq().to_vec(),
                    qual: None,
                    comment: r.desc().map(str::to_string),
                },
            },
        };
        Ok(Some(SequenceRecord {
            comment: record.comment.filter(|_| self.keep_comments),
            ..record
        }))
    }
}

/// Produces chunks from one (single-end) or two (paired-end) inputs.
pub struct ChunkReader {
    first: FastqReader,
    second: Option<FastqReader>,
    next_read_id: u64,
}

impl ChunkReader {
    pub fn single(path: &Path, keep_comments: bool) -> io::Result<Self> {
        Ok(Self { first: FastqReader::open(path, keep_comments)?, second: None, next_read_id: 0 })
    }

    pub fn paired(path1: &Path, path2: &Path, keep_comments: bool) -> io::Result<Self> {
        Ok(Self {
            first: FastqReader::open(path1, keep_comments)?,
            second: Some(FastqReader::open(path2, keep_comments)?),
            next_read_id: 0,
        })
    }

    pub fn is_paired(&self) -> bool {
        self.second.is_some()
    }

    /// Reads until at least `base_budget` bases are held or input ends.
    /// Returns `None` once both inputs are exhausted.
    pub fn next_chunk(&mut self, base_budget: usize) -> io::Result<Option<Chunk>> {
        let mut chunk = Chunk {
            records: Vec::new(),
            paired: self.is_paired(),
            first_read_id: self.next_read_id,
        };
        let mut bases = 0usize;

        while bases < base_budget {
            let Some(r1) = self.first.next_record()? else {
                break;
            };
            bases += r1.len();
            chunk.records.push(r1);

            if let Some(second) = self.second.as_mut() {
                match second.next_record()? {
                    Some(r2) => {
                        bases += r2.len();
                        chunk.records.push(r2);
                    }
                    None => {
                        log::warn!("the second input has fewer sequences than the first");
                        break;
                    }
                }
            }
        }

        if chunk.is_empty() {
            return Ok(None);
        }
        self.next_read_id += chunk.len() as u64;
        log::info!("Read {} sequences ({} bp)", chunk.len(), bases);
        Ok(Some(chunk))
    }
}
