use clap::Args;
use std::path::PathBuf;

use super::error::PipelineError;
use crate::defaults;

/// Options for the `mem` pipeline.
///
/// Built once, validated, then passed by reference to every stage. Nothing in
/// the pipeline reads configuration from anywhere else.
#[derive(Debug, Clone)]
pub struct MemOpt {
    // Scoring
    pub a: i32, // Match score
    pub b: i32, // Mismatch penalty

    // Built-in engine
    pub min_seed_len: i32, // Seed length
    pub max_occ: i32,      // Seeds with more occurrences become symbolic hits
    pub drop_ratio: f32,   // Drop a chain scoring below drop_ratio * best overlapping chain

    // Post-processing
    pub t: i32,          // Minimum score threshold, also the floor of subopt in mapQ
    pub mask_level: f32, // Overlap above mask_level * shorter interval makes a hit redundant

    // Scheduling
    pub n_threads: usize,  // Worker count
    pub chunk_size: usize, // Bases per worker per chunk

    // Pairing
    pub max_ins: i64, // Insert sizes above this are ignored when estimating the distribution

    // Output
    pub hard_clip: bool,        // Emit H instead of S and trim SEQ/QUAL
    pub max_secondary: usize,   // Extra hits reported as secondary records
    pub max_xa_hits: i32,       // XA:Z limit for hits on primary contigs
    /// XA:Z limit when the primary hit lies on an ALT contig. Read from its own
    /// option value, never copied from `max_xa_hits`.
    pub max_xa_hits_alt: i32,
    pub append_comment: bool,   // Copy the FASTQ comment into the record
    pub read_group: Option<String>, // Full @RG header line
    pub read_group_id: Option<String>,

    pub seed: u64,      // Seed of the random source
    pub verbosity: i32, // 1=error, 2=warning, 3=message, 4=debug, 5+=trace
}

impl Default for MemOpt {
    fn default() -> Self {
        MemOpt {
            a: defaults::MATCH_SCORE,
            b: defaults::MISMATCH_PENALTY,
            min_seed_len: defaults::MIN_SEED_LEN,
            max_occ: defaults::MAX_OCCURRENCES,
            drop_ratio: defaults::DROP_CHAIN_FRACTION,
            t: defaults::MIN_SCORE,
            mask_level: defaults::MASK_LEVEL,
            n_threads: 1,
            chunk_size: defaults::CHUNK_SIZE,
            max_ins: defaults::MAX_INSERT,
            hard_clip: false,
            max_secondary: 0,
            max_xa_hits: defaults::MAX_XA_HITS,
            max_xa_hits_alt: defaults::MAX_XA_HITS_ALT,
            append_comment: false,
            read_group: None,
            read_group_id: None,
            seed: defaults::RANDOM_SEED,
            verbosity: defaults::VERBOSITY,
        }
    }
}

impl MemOpt {
    /// Chunk budget in bases: `chunk_size` per worker.
    pub fn chunk_budget(&self) -> usize {
        self.chunk_size.saturating_mul(self.n_threads.max(1))
    }

    /// Log level for `verbosity`.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            v if v <= 1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// XA:Z limit for a primary hit on a contig with the given ALT status.
    pub fn xa_limit(&self, primary_on_alt: bool) -> i32 {
        if primary_on_alt {
            self.max_xa_hits_alt
        } else {
            self.max_xa_hits
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut errors = Vec::new();

        if self.a < 1 {
            errors.push(format!("match_score must be >= 1, got {}", self.a));
        }
        if self.b < 0 {
            errors.push(format!("mismatch_penalty must be >= 0, got {}", self.b));
        }
        if self.min_seed_len < 1 {
            errors.push(format!("min_seed_len must be >= 1, got {}", self.min_seed_len));
        }
        if self.max_occ < 1 {
            errors.push(format!("max_occ must be >= 1, got {}", self.max_occ));
        }
        if !(0.0..=1.0).contains(&self.drop_ratio) {
            errors.push(format!("drop_ratio must be in [0, 1], got {}", self.drop_ratio));
        }
        if !(self.mask_level > 0.0 && self.mask_level <= 1.0) {
            errors.push(format!("mask_level must be in (0, 1], got {}", self.mask_level));
        }
        if self.t < 0 {
            errors.push(format!("score_threshold must be >= 0, got {}", self.t));
        }
        if self.n_threads < 1 {
            errors.push(format!("threads must be >= 1, got {}", self.n_threads));
        }
        if self.chunk_size == 0 {
            errors.push("chunk_size must be > 0".to_string());
        }
        if self.max_xa_hits < 0 || self.max_xa_hits_alt < 0 {
            errors.push(format!(
                "XA limits must be >= 0, got {},{}",
                self.max_xa_hits, self.max_xa_hits_alt
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidOption(errors.join("; ")))
        }
    }

    /// Translates parsed command-line options.
    pub fn from_cli(cli: &MemCliOptions) -> Result<Self, PipelineError> {
        let (max_xa_hits, max_xa_hits_alt) =
            parse_xa_hits(&cli.max_xa_hits).map_err(PipelineError::InvalidOption)?;

        let (read_group, read_group_id) = match &cli.read_group {
            Some(line) => {
                let line = normalize_read_group(line).map_err(PipelineError::InvalidOption)?;
                let id = extract_rg_id(&line);
                (Some(line), id)
            }
            None => (None, None),
        };

        let n_threads = cli.threads.unwrap_or_else(num_cpus::get).max(1);

        let opt = MemOpt {
            a: cli.match_score,
            b: cli.mismatch_penalty,
            min_seed_len: cli.min_seed_len,
            max_occ: cli.max_occurrences,
            drop_ratio: cli.drop_chain_fraction,
            t: cli.min_score,
            mask_level: cli.mask_level,
            n_threads,
            chunk_size: cli.chunk_size.unwrap_or(defaults::CHUNK_SIZE),
            max_ins: cli.max_insert,
            hard_clip: cli.hard_clip,
            max_secondary: cli.max_secondary,
            max_xa_hits,
            // Each limit comes from its own field.
            max_xa_hits_alt,
            append_comment: cli.append_comment,
            read_group,
            read_group_id,
            seed: cli.seed,
            verbosity: cli.verbosity as i32,
        };
        opt.validate()?;
        Ok(opt)
    }
}

#[derive(Debug, Clone, Args)]
pub struct MemCliOptions {
    /// Reference FASTA, or the prefix of an existing BWA index (.ann/.amb/.pac)
    #[arg(value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// Input FASTQ file(s) - one file for single-end, two files for paired-end
    #[arg(value_name = "READS.FQ", required = true, num_args = 1..=2)]
    pub reads: Vec<PathBuf>,

    // ===== Engine Options =====
    /// Seed length
    #[arg(short = 'k', long, value_name = "INT", default_value_t = defaults::MIN_SEED_LEN)]
    pub min_seed_len: i32,

    /// Collapse seeds with more than INT occurrences into one symbolic hit
    #[arg(short = 'c', long, value_name = "INT", default_value_t = defaults::MAX_OCCURRENCES)]
    pub max_occurrences: i32,

    /// Drop chains scoring below FLOAT fraction of the best overlapping chain
    #[arg(short = 'D', long, value_name = "FLOAT", default_value_t = defaults::DROP_CHAIN_FRACTION)]
    pub drop_chain_fraction: f32,

    // ===== Scoring Options =====
    /// Score for a sequence match
    #[arg(short = 'A', long, value_name = "INT", default_value_t = defaults::MATCH_SCORE)]
    pub match_score: i32,

    /// Penalty for a mismatch
    #[arg(short = 'B', long, value_name = "INT", default_value_t = defaults::MISMATCH_PENALTY)]
    pub mismatch_penalty: i32,

    /// Minimum score to output
    #[arg(short = 'T', long, value_name = "INT", default_value_t = defaults::MIN_SCORE)]
    pub min_score: i32,

    /// Hits overlapping a better hit by more than FLOAT of the shorter one are redundant
    #[arg(short = 'm', long, value_name = "FLOAT", default_value_t = defaults::MASK_LEVEL)]
    pub mask_level: f32,

    /// Maximum insert size considered when estimating the insert-size distribution
    #[arg(short = 'I', long, value_name = "INT", default_value_t = defaults::MAX_INSERT)]
    pub max_insert: i64,

    // ===== I/O Options =====
    /// Output SAM file (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Read group header line such as '@RG\tID:foo\tSM:bar'
    #[arg(short = 'R', long, value_name = "STR")]
    pub read_group: Option<String>,

    /// Use hard clipping in the SAM output
    #[arg(short = 'H', long)]
    pub hard_clip: bool,

    /// Report up to INT secondary hits as separate records
    #[arg(short = 'N', long, value_name = "INT", default_value_t = 0)]
    pub max_secondary: usize,

    /// If there are <INT alternative hits, list them all in XA [5,200]
    #[arg(short = 'x', long, value_name = "INT[,INT]", default_value = defaults::MAX_XA_HITS_STR)]
    pub max_xa_hits: String,

    /// Append FASTA/FASTQ comment to SAM output
    #[arg(short = 'C', long)]
    pub append_comment: bool,

    /// Seed of the random source used for ambiguous bases and random picks
    #[arg(long, value_name = "INT", default_value_t = defaults::RANDOM_SEED)]
    pub seed: u64,

    // ===== Processing Options =====
    /// Number of worker threads (default: all available cores)
    #[arg(short = 't', long, value_name = "INT")]
    pub threads: Option<usize>,

    /// Bases per worker in each chunk
    #[arg(short = 'K', long, value_name = "INT")]
    pub chunk_size: Option<usize>,

    /// Verbose level: 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value_t = 3)]
    pub verbosity: u8,
}

/// Parse XA hits string "INT" or "INT,INT"
pub fn parse_xa_hits(s: &str) -> Result<(i32, i32), String> {
    let parts: Vec<&str> = s.split(',').collect();
    match parts.len() {
        1 => {
            let val = parts[0]
                .trim()
                .parse::<i32>()
                .map_err(|_| format!("Invalid XA hits value: {s}"))?;
            Ok((val, defaults::MAX_XA_HITS_ALT))
        }
        2 => {
            let primary = parts[0]
                .trim()
                .parse::<i32>()
                .map_err(|_| format!("Invalid primary XA hits: {}", parts[0]))?;
            let alt = parts[1]
                .trim()
                .parse::<i32>()
                .map_err(|_| format!("Invalid alt XA hits: {}", parts[1]))?;
            Ok((primary, alt))
        }
        _ => Err(format!("XA hits must be INT or INT,INT: {s}")),
    }
}

/// Turns literal `\t` sequences into tabs and checks the line is a usable @RG line.
pub fn normalize_read_group(line: &str) -> Result<String, String> {
    let line = line.replace("\\t", "\t");
    if !line.starts_with("@RG") {
        return Err(format!("read group line must start with @RG: {line}"));
    }
    if line.contains('\n') {
        return Err("read group line must be a single line".to_string());
    }
    if extract_rg_id(&line).is_none() {
        return Err(format!("read group line has no ID field: {line}"));
    }
    Ok(line)
}

/// Extract read group ID from read group header line
/// Example input: "@RG\tID:foo\tSM:bar" -> "foo"
pub fn extract_rg_id(rg_line: &str) -> Option<String> {
    let stripped = rg_line.strip_prefix("@RG\t").unwrap_or(rg_line);
    stripped
        .split('\t')
        .find_map(|field| field.strip_prefix("ID:"))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
