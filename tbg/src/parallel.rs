//! Chunked evaluation of per-k work on a fixed-size thread pool.
//!
//! Every chunk runs as one task. Finished chunks report back over a channel
//! tagged with their index; the collector waits for all of them and then
//! restores input order, so the output never depends on scheduling.

use crate::error::{Result, Stage, TbgError};
use crate::model::KPoint;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use tracing::{debug, info};

/// Result of one chunk, tagged with the chunk's position in the input.
#[derive(Debug)]
pub struct ChunkResult<T> {
    pub chunk_index: usize,
    pub payload: Result<Vec<T>>,
}

pub struct ParallelEvaluator {
    workers: usize,
    pool: ThreadPool,
}

impl ParallelEvaluator {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(TbgError::invalid("workers", "at least one worker is required"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tbg-worker-{}", i))
            .build()
            .map_err(|e| TbgError::ThreadPool(e.to_string()))?;
        debug!("thread pool ready with {} workers", workers);
        Ok(ParallelEvaluator { workers, pool })
    }

    pub fn with_available_parallelism() -> Result<Self> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Splits `items` into at most `workers` contiguous chunks of
    /// `len / workers` items; the last chunk also takes the remainder.
    pub fn partition<'a, T>(&self, items: &'a [T]) -> Vec<&'a [T]> {
        if items.is_empty() {
            return Vec::new();
        }
        let chunks = self.workers.min(items.len());
        let size = items.len() / chunks;
        (0..chunks)
            .map(|c| {
                let start = c * size;
                let end = if c + 1 == chunks { items.len() } else { start + size };
                &items[start..end]
            })
            .collect()
    }

    /// Evaluates `f` on every point, partitioned over the workers, and
    /// returns the results in input order.
    pub fn evaluate<T, F>(&self, points: &[KPoint], f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&KPoint) -> Result<T> + Sync,
    {
        let chunks = self.partition(points);
        info!(
            "Evaluating {} k-points in {} chunks on {} workers",
            points.len(),
            chunks.len(),
            self.workers
        );
        Ok(self
            .evaluate_chunks(&chunks, f)?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Evaluates caller-defined chunks, e.g. one per path segment. Output
    /// keeps the chunk structure.
    pub fn evaluate_chunks<T, F>(&self, chunks: &[&[KPoint]], f: F) -> Result<Vec<Vec<T>>>
    where
        T: Send,
        F: Fn(&KPoint) -> Result<T> + Sync,
    {
        let (tx, rx) = mpsc::channel::<ChunkResult<T>>();
        let f = &f;

        self.pool.scope(|scope| {
            for (chunk_index, chunk) in chunks.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let payload = run_chunk(chunk_index, chunk, f);
                    // the receiver outlives the scope
                    let _ = tx.send(ChunkResult {
                        chunk_index,
                        payload,
                    });
                });
            }
        });
        drop(tx);

        let mut results: Vec<ChunkResult<T>> = rx.into_iter().collect();
        results.sort_by_key(|r| r.chunk_index);
        debug!("collected {} of {} chunks", results.len(), chunks.len());

        if results.len() != chunks.len() {
            return Err(TbgError::WorkerFailure {
                chunk: results.len(),
                stage: Stage::Evaluation,
                message: "chunk result was lost".to_string(),
            });
        }

        results.into_iter().map(|r| r.payload).collect()
    }
}

fn run_chunk<T, F>(chunk_index: usize, chunk: &[KPoint], f: &F) -> Result<Vec<T>>
where
    F: Fn(&KPoint) -> Result<T>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        chunk.iter().map(f).collect::<Result<Vec<T>>>()
    }));
    match outcome {
        Ok(Ok(values)) => Ok(values),
        Ok(Err(TbgError::WorkerFailure { stage, message, .. }))
        | Ok(Err(TbgError::Numerical { stage, message })) => Err(TbgError::WorkerFailure {
            chunk: chunk_index,
            stage,
            message,
        }),
        Ok(Err(err)) => Err(TbgError::WorkerFailure {
            chunk: chunk_index,
            stage: err.stage(),
            message: err.to_string(),
        }),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            Err(TbgError::WorkerFailure {
                chunk: chunk_index,
                stage: Stage::Evaluation,
                message,
            })
        }
    }
}
