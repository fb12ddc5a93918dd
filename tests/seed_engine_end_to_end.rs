// tests/seed_engine_end_to_end.rs
//
// Full runs with the built-in seed engine: worker-count independence,
// paired-end output and the file-driven run loop.

use std::io::Write;

use ferrous_report::core::io::fastq_reader::{Chunk, ChunkReader, SequenceRecord};
use ferrous_report::core::io::sam_output::write_chunk;
use ferrous_report::core::utils::reverse_complement;
use ferrous_report::index::reference::ReferenceIndex;
use ferrous_report::pipelines::linear::engine::SeedEngine;
use ferrous_report::pipelines::linear::finalization::sam_flags;
use ferrous_report::pipelines::linear::mem_opt::MemOpt;
use ferrous_report::pipelines::linear::orchestrator::ChunkProcessor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

const READ_LEN: usize = 70;

fn random_seq(len: usize, rng: &mut StdRng) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

/// Two 5 kb contigs plus their ASCII sequence.
fn genome() -> (ReferenceIndex, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(2024);
    let chr1 = random_seq(5000, &mut rng);
    let chr2 = random_seq(5000, &mut rng);
    let index = ReferenceIndex::from_sequences(
        [("chr1", chr1.as_slice()), ("chr2", chr2.as_slice())],
        &mut rng,
    );
    let mut concat = chr1;
    concat.extend_from_slice(&chr2);
    (index, concat)
}

/// Mixed single-end reads: forward, reverse, with mismatches, with N, and noise.
fn single_reads(genome: &[u8]) -> Vec<SequenceRecord> {
    let mut rng = StdRng::seed_from_u64(77);
    (0..48)
        .map(|i| {
            let pos = rng.gen_range(0..genome.len() - READ_LEN);
            let mut seq = genome[pos..pos + READ_LEN].to_vec();
            match i % 4 {
                1 => seq = reverse_complement(&seq),
                2 => {
                    seq[10] = if seq[10] == b'A' { b'C' } else { b'A' };
                    seq[40] = b'N';
                }
                3 if i % 8 == 3 => seq = random_seq(READ_LEN, &mut rng),
                _ => {}
            }
            SequenceRecord::new(&format!("read{i}"), &seq, Some(&vec![b'F'; READ_LEN]))
        })
        .collect()
}

/// FR pairs with a 300 bp insert, interleaved.
fn paired_reads(genome: &[u8], n_pairs: usize) -> Vec<SequenceRecord> {
    let mut rng = StdRng::seed_from_u64(99);
    let mut records = Vec::with_capacity(n_pairs * 2);
    for i in 0..n_pairs {
        // keep both mates on chr1
        let start = rng.gen_range(0..5000 - 300);
        let r1 = genome[start..start + READ_LEN].to_vec();
        let r2 = reverse_complement(&genome[start + 300 - READ_LEN..start + 300]);
        records.push(SequenceRecord::new(&format!("pair{i}/1"), &r1, None));
        records.push(SequenceRecord::new(&format!("pair{i}/2"), &r2, None));
    }
    records
}

fn run_chunk(
    engine: &SeedEngine,
    index: &ReferenceIndex,
    opt: &MemOpt,
    records: Vec<SequenceRecord>,
    paired: bool,
) -> String {
    let mut processor = ChunkProcessor::new(engine, index, opt).unwrap();
    let processed = processor.process(Chunk { records, paired, first_read_id: 0 }).unwrap();
    let mut out = Vec::new();
    write_chunk(&mut out, &processed.records, &processed.results, index, opt).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn single_and_multi_worker_output_is_identical() {
    let (index, seq) = genome();
    let base = MemOpt::default();
    let engine = SeedEngine::new(&index, &base);
    let reads = single_reads(&seq);

    let one = run_chunk(&engine, &index, &MemOpt { n_threads: 1, ..base.clone() }, reads.clone(), false);
    let many = run_chunk(&engine, &index, &MemOpt { n_threads: 5, ..base.clone() }, reads, false);
    assert_eq!(one, many);

    let names: Vec<&str> = one.lines().map(|l| l.split('\t').next().unwrap()).collect();
    let expected: Vec<String> = (0..48).map(|i| format!("read{i}")).collect();
    assert_eq!(names, expected);
}

#[test]
fn paired_single_and_multi_worker_output_is_identical() {
    let (index, seq) = genome();
    let base = MemOpt::default();
    let engine = SeedEngine::new(&index, &base);
    let reads = paired_reads(&seq, 20);

    let one = run_chunk(&engine, &index, &MemOpt { n_threads: 1, ..base.clone() }, reads.clone(), true);
    let many = run_chunk(&engine, &index, &MemOpt { n_threads: 3, ..base.clone() }, reads, true);
    assert_eq!(one, many);
}

fn int_tag(record: &[String], name: &str) -> u32 {
    let prefix = format!("{name}:i:");
    record
        .iter()
        .find_map(|t| t.strip_prefix(&prefix))
        .unwrap_or_else(|| panic!("no {name} in {record:?}"))
        .parse()
        .unwrap()
}

#[test]
fn fr_pairs_are_properly_paired_with_template_length() {
    let (index, seq) = genome();
    let opt = MemOpt::default();
    let engine = SeedEngine::new(&index, &opt);
    let out = run_chunk(&engine, &index, &opt, paired_reads(&seq, 20), true);

    let lines: Vec<Vec<String>> = out
        .lines()
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect();
    assert_eq!(lines.len(), 40);
    for pair in lines.chunks(2) {
        let f1: u16 = pair[0][1].parse().unwrap();
        let f2: u16 = pair[1][1].parse().unwrap();
        assert_ne!(f1 & sam_flags::PROPER_PAIR, 0, "{:?}", pair[0]);
        assert_ne!(f2 & sam_flags::REVERSE, 0);
        assert_ne!(f1 & sam_flags::MATE_REVERSE, 0);
        assert_eq!(pair[0][6], "=");
        assert_eq!(pair[0][8], "300");
        assert_eq!(pair[1][8], "-300");
        // AM is the smaller of the two mates' single-end qualities.
        let sm: Vec<u32> = pair.iter().map(|r| int_tag(r, "SM")).collect();
        for record in pair {
            assert_eq!(int_tag(record, "AM"), sm[0].min(sm[1]));
            assert!(record.iter().any(|t| t.starts_with("MD:Z:")));
        }
    }
}

#[test]
fn run_loop_reads_files_and_counts() {
    let (index, seq) = genome();
    let opt = MemOpt { chunk_size: 500, n_threads: 2, ..Default::default() };
    let engine = SeedEngine::new(&index, &opt);

    let mut fastq = NamedTempFile::new().unwrap();
    for record in single_reads(&seq) {
        writeln!(fastq, "@{}", record.name).unwrap();
        fastq.write_all(&record.seq).unwrap();
        writeln!(fastq, "\n+").unwrap();
        fastq.write_all(record.qual.as_deref().unwrap()).unwrap();
        writeln!(fastq).unwrap();
    }
    fastq.flush().unwrap();

    let mut reader = ChunkReader::single(fastq.path(), false).unwrap();
    let mut out = Vec::new();
    let mut processor = ChunkProcessor::new(&engine, &index, &opt).unwrap();
    let stats = processor.run(&mut reader, &mut out).unwrap();

    assert_eq!(stats.reads, 48);
    assert_eq!(stats.bases, 48 * READ_LEN);
    // 1000-base budget holds 15 reads of 70 bp
    assert_eq!(stats.chunks, 4);
    assert_eq!(stats.failed_chunks, 0);
    assert_eq!(stats.records, 48);
    assert!(stats.unmapped >= 6);

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 48);
}
