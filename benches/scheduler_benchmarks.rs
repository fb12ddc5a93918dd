use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use ferrous_report::core::io::fastq_reader::{Chunk, SequenceRecord};
use ferrous_report::index::reference::ReferenceIndex;
use ferrous_report::pipelines::linear::engine::SeedEngine;
use ferrous_report::pipelines::linear::mem_opt::MemOpt;
use ferrous_report::pipelines::linear::orchestrator::ChunkProcessor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const READ_LEN: usize = 100;

fn random_seq(len: usize, rng: &mut StdRng) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

/// 200 kb reference and reads sampled from it
fn setup(n_reads: usize) -> (ReferenceIndex, Vec<SequenceRecord>) {
    let mut rng = StdRng::seed_from_u64(5);
    let genome = random_seq(200_000, &mut rng);
    let index = ReferenceIndex::from_sequences([("chr1", genome.as_slice())], &mut rng);
    let reads = (0..n_reads)
        .map(|i| {
            let pos = rng.gen_range(0..genome.len() - READ_LEN);
            SequenceRecord::new(&format!("r{i}"), &genome[pos..pos + READ_LEN], None)
        })
        .collect();
    (index, reads)
}

fn bench_worker_scaling(c: &mut Criterion) {
    let (index, reads) = setup(2_000);
    let base = MemOpt::default();
    let engine = SeedEngine::new(&index, &base);

    let mut group = c.benchmark_group("chunk_processing");
    group.throughput(Throughput::Elements(reads.len() as u64));

    for workers in [1usize, 2, 4, 8] {
        let opt = MemOpt { n_threads: workers, ..base.clone() };
        let mut processor = match ChunkProcessor::new(&engine, &index, &opt) {
            Ok(p) => p,
            Err(_) => continue,
        };
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.iter(|| {
                let chunk = Chunk { records: reads.clone(), paired: false, first_read_id: 0 };
                let processed = processor.process(chunk);
                black_box(processed.map(|p| p.results.len()).unwrap_or(0))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_worker_scaling);
criterion_main!(benches);
