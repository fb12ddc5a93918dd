//! Worker scheduler.
//!
//! Read `i` of a chunk goes to worker `(i >> paired_bit) % W`, so both mates
//! of a pair share a worker. Each worker walks its reads in index order with
//! its own [`Arena`]; results are scattered back by index once every worker
//! has finished. Any worker error fails the whole chunk.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::core::alignment::workspace::Arena;
use crate::pipelines::linear::error::PipelineError;

/// Worker that owns read `index`.
#[inline]
pub fn worker_of(index: usize, paired: bool, n_workers: usize) -> usize {
    (index >> paired as usize) % n_workers.max(1)
}

/// Fixed pool of workers, each with a private scratch arena.
pub struct WorkerScheduler {
    pool: ThreadPool,
    arenas: Vec<Arena>,
}

impl WorkerScheduler {
    pub fn new(n_workers: usize) -> Result<Self, PipelineError> {
        let n_workers = n_workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .thread_name(|i| format!("worker-{i}"))
            .build()
            .map_err(|e| PipelineError::InvalidOption(format!("cannot start {n_workers} workers: {e}")))?;
        log::debug!("WorkerScheduler: {n_workers} workers");
        Ok(Self { pool, arenas: (0..n_workers).map(|_| Arena::new()).collect() })
    }

    pub fn n_workers(&self) -> usize {
        self.arenas.len()
    }

    /// Current arena sizes, one per worker.
    pub fn arena_capacities(&self) -> Vec<usize> {
        self.arenas.iter().map(Arena::capacity).collect()
    }

    /// Runs `work(i, arena)` for every `i < n_items` and returns the results
    /// in index order.
    pub fn run<T, F>(&mut self, n_items: usize, paired: bool, work: F) -> Result<Vec<T>, PipelineError>
    where
        T: Send,
        F: Fn(usize, &mut Arena) -> Result<T, PipelineError> + Sync,
    {
        let n_workers = self.arenas.len();
        let mut assignments: Vec<Vec<usize>> = vec![Vec::new(); n_workers];
        for i in 0..n_items {
            assignments[worker_of(i, paired, n_workers)].push(i);
        }

        let Self { pool, arenas } = self;
        let per_worker: Vec<Result<Vec<(usize, T)>, PipelineError>> = pool.install(|| {
            arenas
                .par_iter_mut()
                .zip(assignments.par_iter())
                .map(|(arena, indices)| {
                    indices
                        .iter()
                        .map(|&i| work(i, arena).map(|out| (i, out)))
                        .collect()
                })
                .collect()
        });

        // Join barrier passed: scatter back by original index.
        let mut slots: Vec<Option<T>> = (0..n_items).map(|_| None).collect();
        for worker in per_worker {
            for (i, out) in worker? {
                slots[i] = Some(out);
            }
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| PipelineError::engine(&format!("#{i}"), "no result after join"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mates_share_a_worker() {
        for i in (0..64).step_by(2) {
            assert_eq!(worker_of(i, true, 3), worker_of(i + 1, true, 3));
        }
        assert_eq!(worker_of(5, false, 3), 2);
        assert_eq!(worker_of(5, true, 3), 2);
        assert_eq!(worker_of(7, true, 1), 0);
    }

    #[test]
    fn test_results_come_back_in_input_order() {
        let mut scheduler = WorkerScheduler::new(4).unwrap();
        let out = scheduler.run(10, false, |i, _| Ok(i * 10)).unwrap();
        assert_eq!(out, (0..10).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_arenas_grow_per_worker() {
        let mut scheduler = WorkerScheduler::new(2).unwrap();
        scheduler
            .run(4, false, |i, arena| {
                arena.ensure((i + 1) * 100).map_err(|e| e.into_pipeline("r"))
            })
            .unwrap();
        // worker 0 saw reads 0 and 2, worker 1 reads 1 and 3
        assert_eq!(scheduler.arena_capacities(), vec![300, 400]);
    }

    #[test]
    fn test_any_failure_fails_the_run() {
        let mut scheduler = WorkerScheduler::new(3).unwrap();
        let err = scheduler
            .run(6, false, |i, _| {
                if i == 4 {
                    Err(PipelineError::engine("r4", "bad hit"))
                } else {
                    Ok(i)
                }
            })
            .unwrap_err();
        assert!(err.is_fatal_to_chunk());
    }
}
