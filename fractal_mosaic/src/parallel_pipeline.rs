// THEORY:
// The `WorkerPool` is the scheduler for a mosaic pass. It knows nothing about
// colors or tiles; it takes an ordered list of blocks and a per-block function
// and runs that function over every block on a fixed number of workers.
//
// Key architectural principles:
// 1.  **Contiguous Chunks**: The block list is cut into `worker_count` contiguous
//     ranges (the last may be shorter). Each range goes to one blocking task on
//     tokio's blocking pool, because the work is CPU-bound and must not stall the
//     async reactor.
// 2.  **Disjoint Results**: A worker returns its results as one vector, in block
//     order. Results from different workers cover different blocks, so merging
//     them needs no locking at all.
// 3.  **Cooperative Stop**: Before every block a worker checks the caller's
//     `CancelToken` and a pool-internal abort flag. The first real failure raises
//     the abort flag, so the rest of the pool winds down within one block.
// 4.  **Ordered Progress**: Completions are counted under one small lock, so a
//     progress sink always sees `completed` strictly increasing, whichever worker
//     finished the block.

use crate::core_modules::grid_manager::Block;
use crate::core_modules::progress::{CancelToken, Progress, ProgressSink};
use crate::error::{MosaicError, MosaicResult};
use futures::future::join_all;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Ceiling on worker threads, regardless of hardware or hints.
pub const MAX_WORKERS: usize = 32;

/// Picks the worker count from an optional hint, the machine, and the job size.
pub fn resolve_worker_count(hint: Option<usize>, blocks: usize) -> usize {
    let requested = hint.unwrap_or_else(num_cpus::get);
    requested.clamp(1, MAX_WORKERS).min(blocks.max(1))
}

/// Splits `len` items into at most `workers` contiguous, non-empty ranges.
pub fn chunk_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 || workers == 0 {
        return Vec::new();
    }
    let step = len.div_ceil(workers);
    (0..len).step_by(step).map(|start| start..(start + step).min(len)).collect()
}

/// A fixed-size pool of blocking workers for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> MosaicResult<Self> {
        if worker_count == 0 {
            return Err(MosaicError::invalid("worker count must be at least 1"));
        }
        Ok(Self {
            worker_count: worker_count.min(MAX_WORKERS),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Runs `per_block` over every block and returns each worker's results, in
    /// worker order. Concatenated, they follow the order of `blocks`.
    pub async fn run<T, F>(
        &self,
        blocks: Arc<[Block]>,
        per_block: F,
        progress: Arc<dyn ProgressSink>,
        cancel: CancelToken,
    ) -> MosaicResult<Vec<Vec<T>>>
    where
        T: Send + 'static,
        F: Fn(&Block) -> MosaicResult<T> + Send + Sync + 'static,
    {
        let total = blocks.len();
        let ranges = chunk_ranges(total, self.worker_count);
        debug!(total, chunks = ranges.len(), "dispatching blocks");

        let per_block = Arc::new(per_block);
        let abort = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(Mutex::new(0usize));

        let handles = ranges.into_iter().enumerate().map(|(worker_id, range)| {
            let blocks = Arc::clone(&blocks);
            let per_block = Arc::clone(&per_block);
            let abort = Arc::clone(&abort);
            let completed = Arc::clone(&completed);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();

            tokio::task::spawn_blocking(move || {
                debug!(worker_id, start = range.start, end = range.end, "worker started");
                let mut results = Vec::with_capacity(range.len());
                for block in &blocks[range] {
                    if cancel.is_cancelled() || abort.load(Ordering::Acquire) {
                        debug!(worker_id, done = results.len(), "worker stopping early");
                        return Err(MosaicError::Cancelled);
                    }
                    match per_block(block) {
                        Ok(value) => results.push(value),
                        Err(e) => {
                            abort.store(true, Ordering::Release);
                            return Err(e);
                        }
                    }

                    let mut done = completed.lock().unwrap_or_else(PoisonError::into_inner);
                    *done += 1;
                    progress.report(Progress { completed: *done, total });
                }
                debug!(worker_id, blocks = results.len(), "worker finished");
                Ok(results)
            })
        });

        let joined = join_all(handles).await;

        let mut outputs = Vec::with_capacity(joined.len());
        let mut cancelled = false;
        let mut failure = None;
        for outcome in joined {
            match outcome {
                Ok(Ok(results)) => outputs.push(results),
                Ok(Err(MosaicError::Cancelled)) => cancelled = true,
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(join_err) => {
                    failure.get_or_insert(MosaicError::Worker(join_err.to_string()));
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if cancelled || cancel.is_cancelled() {
            warn!(total, "block processing cancelled");
            return Err(MosaicError::Cancelled);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::grid_manager::BlockGrid;
    use crate::core_modules::progress::NoProgress;

    #[test]
    fn ranges_are_contiguous_and_complete() {
        for len in [1, 5, 6, 7, 100] {
            for workers in [1, 2, 3, 8, 200] {
                let ranges = chunk_ranges(len, workers);
                assert!(ranges.len() <= workers);
                assert_eq!(ranges.first().unwrap().start, 0);
                assert_eq!(ranges.last().unwrap().end, len);
                assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
                assert!(ranges.iter().all(|r| !r.is_empty()));
            }
        }
        assert_eq!(chunk_ranges(10, 3), vec![0..4, 4..8, 8..10]);
        assert!(chunk_ranges(0, 4).is_empty());
    }

    #[test]
    fn worker_count_is_bounded() {
        assert_eq!(resolve_worker_count(Some(0), 100), 1);
        assert_eq!(resolve_worker_count(Some(1000), 100), MAX_WORKERS);
        assert_eq!(resolve_worker_count(Some(8), 3), 3);
        assert_eq!(resolve_worker_count(Some(4), 0), 1);
        let auto = resolve_worker_count(None, 10_000);
        assert!((1..=MAX_WORKERS).contains(&auto));
    }

    #[test]
    fn zero_workers_is_invalid() {
        assert!(matches!(WorkerPool::new(0), Err(MosaicError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn results_follow_block_order() {
        let grid = BlockGrid::partition(50, 30, 10).unwrap();
        let pool = WorkerPool::new(4).unwrap();
        let out = pool
            .run(grid.shared_blocks(), |b: &Block| Ok((b.row, b.col)), Arc::new(NoProgress), CancelToken::new())
            .await
            .unwrap();

        let flat: Vec<(u32, u32)> = out.into_iter().flatten().collect();
        let expected: Vec<(u32, u32)> = grid.blocks().iter().map(|b| (b.row, b.col)).collect();
        assert_eq!(flat, expected);
    }

    #[tokio::test]
    async fn progress_is_strictly_increasing() {
        let grid = BlockGrid::partition(64, 64, 4).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |p: Progress| seen.lock().unwrap().push(p)
        };

        WorkerPool::new(8)
            .unwrap()
            .run(grid.shared_blocks(), |_: &Block| Ok(()), Arc::new(sink), CancelToken::new())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), grid.len());
        assert!(seen.iter().all(|p| p.total == grid.len()));
        assert!(seen.windows(2).all(|w| w[0].completed + 1 == w[1].completed));
        assert_eq!(seen.last().unwrap().completed, grid.len());
    }

    #[tokio::test]
    async fn first_failure_aborts_the_run() {
        let grid = BlockGrid::partition(100, 100, 10).unwrap();
        let result = WorkerPool::new(4)
            .unwrap()
            .run(
                grid.shared_blocks(),
                |b: &Block| {
                    if b.row == 5 && b.col == 5 {
                        Err(MosaicError::ResourceExhaustion("tile buffer".into()))
                    } else {
                        Ok(())
                    }
                },
                Arc::new(NoProgress),
                CancelToken::new(),
            )
            .await;
        assert!(matches!(result, Err(MosaicError::ResourceExhaustion(_))));
    }

    #[tokio::test]
    async fn pre_cancelled_run_does_no_work() {
        let grid = BlockGrid::partition(20, 20, 5).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);

        let result = WorkerPool::new(2)
            .unwrap()
            .run(
                grid.shared_blocks(),
                move |_: &Block| {
                    *counter.lock().unwrap() += 1;
                    Ok(())
                },
                Arc::new(NoProgress),
                cancel,
            )
            .await;

        assert!(matches!(result, Err(MosaicError::Cancelled)));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn panicking_worker_is_reported() {
        let grid = BlockGrid::partition(10, 10, 5).unwrap();
        let result: MosaicResult<Vec<Vec<()>>> = WorkerPool::new(2)
            .unwrap()
            .run(
                grid.shared_blocks(),
                |b: &Block| {
                    if b.row == 1 {
                        panic!("boom");
                    }
                    Ok(())
                },
                Arc::new(NoProgress),
                CancelToken::new(),
            )
            .await;
        assert!(matches!(result, Err(MosaicError::Worker(_))));
    }
}
