// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The fan-out/fan-in engine: splits a range into contiguous chunks,
//! dispatches one worker call per chunk onto the pool, and collects the
//! partial results in chunk order.

use super::pool::{ThreadPool, WorkerTask};
use crate::macros::log_debug;
#[cfg(feature = "log_parallelism")]
use crate::macros::log_info;
use crossbeam_utils::CachePadded;
use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Executor parameters: the chunk-granularity policy attached to a parallel
/// execution policy.
#[derive(Clone, Copy, Debug)]
pub struct ChunkParams {
    /// Upper bound on the number of chunks; `None` means one chunk per pool
    /// worker.
    pub max_chunks: Option<usize>,
    /// Minimum number of elements per chunk, to avoid oversubscription on
    /// small inputs.
    pub min_chunk_len: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_chunks: None,
            min_chunk_len: 1,
        }
    }
}

impl ChunkParams {
    /// Number of chunks for an input of `len` elements on `workers` workers:
    /// at least one element per chunk, at most one chunk per worker unless
    /// overridden, shrunk so no chunk falls below the minimum length.
    fn chunk_count(&self, len: usize, workers: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let cap = self.max_chunks.unwrap_or(workers).max(1);
        let by_min_len = len / self.min_chunk_len.max(1);
        cap.min(by_min_len).clamp(1, len)
    }

    /// The contiguous chunk ranges partitioning `0..len`: boundaries at
    /// `i * len / count`, so the remainder is spread across the chunks.
    pub(crate) fn split(&self, len: usize, workers: usize) -> Vec<Range<usize>> {
        let count = self.chunk_count(len, workers);
        let boundary = |i: usize| ((i as u128 * len as u128) / count.max(1) as u128) as usize;
        (0..count).map(|i| boundary(i)..boundary(i + 1)).collect()
    }
}

/// Composite panic payload aggregating the unwinds of all failed chunks,
/// ordered by chunk index.
///
/// Raised via [`std::panic::panic_any`] once every chunk of the invocation
/// has settled; delivered at the synchronous call site, or when a task
/// policy's [`Job`](crate::Job) is joined.
pub struct PanicBundle {
    failures: Vec<(usize, Box<dyn Any + Send + 'static>)>,
}

impl PanicBundle {
    fn new(failures: Vec<(usize, Box<dyn Any + Send + 'static>)>) -> Self {
        debug_assert!(!failures.is_empty());
        Self { failures }
    }

    /// Number of chunks that panicked.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True if no chunk panicked (never the case for a raised bundle).
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The indices of the chunks that panicked, in increasing order.
    pub fn chunk_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.failures.iter().map(|(i, _)| *i)
    }

    /// The captured panic payloads, ordered by chunk index.
    pub fn payloads(&self) -> impl Iterator<Item = &(dyn Any + Send + 'static)> + '_ {
        self.failures.iter().map(|(_, p)| &**p)
    }
}

impl fmt::Debug for PanicBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicBundle")
            .field("chunks", &self.chunk_indices().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for PanicBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker chunk(s) panicked", self.failures.len())
    }
}

/// The fan-out/fan-in engine handed to an algorithm's parallel body.
///
/// Borrows the pool for the duration of one algorithm invocation and carries
/// the invocation's [`ChunkParams`].
pub struct Partitioner<'pool> {
    pool: &'pool mut ThreadPool,
    params: ChunkParams,
}

impl<'pool> Partitioner<'pool> {
    pub(crate) fn new(pool: &'pool mut ThreadPool, params: ChunkParams) -> Self {
        Self { pool, params }
    }

    /// Number of pool workers available to this invocation.
    pub fn num_workers(&self) -> usize {
        self.pool.num_threads().get()
    }

    /// The chunk ranges this partitioner uses for an input of `len`
    /// elements. Deterministic: repeated calls with the same `len` split
    /// identically (multi-pass algorithms rely on this).
    pub fn chunk_ranges(&self, len: usize) -> Vec<Range<usize>> {
        self.params.split(len, self.num_workers())
    }

    /// Fans `worker` out over the chunks of `0..len` and returns the
    /// outputs indexed by chunk position, regardless of completion order.
    ///
    /// If any chunk panics, all remaining chunks are still drained, and a
    /// single [`PanicBundle`] aggregating every captured payload is raised
    /// instead of returning. A split of one chunk runs inline on the calling
    /// thread and its panic, if any, propagates as is.
    pub fn run<Out: Send>(
        &mut self,
        len: usize,
        worker: impl Fn(usize, Range<usize>) -> Out + Sync,
    ) -> Vec<Out> {
        self.run_with(len, worker, |_| {})
    }

    /// Like [`run()`](Self::run), but on failure invokes `cleanup` with the
    /// range of every chunk that completed successfully before raising the
    /// bundle. Used by algorithms that construct into raw storage and must
    /// leave no element alive on partial failure.
    pub fn run_with_cleanup<Out: Send>(
        &mut self,
        len: usize,
        worker: impl Fn(usize, Range<usize>) -> Out + Sync,
        cleanup: impl Fn(Range<usize>),
    ) -> Vec<Out> {
        self.run_with(len, worker, cleanup)
    }

    fn run_with<Out: Send>(
        &mut self,
        len: usize,
        worker: impl Fn(usize, Range<usize>) -> Out + Sync,
        cleanup: impl Fn(Range<usize>),
    ) -> Vec<Out> {
        let chunks = self.chunk_ranges(len);
        match chunks.len() {
            0 => return Vec::new(),
            1 => return vec![worker(0, 0..len)],
            _ => {}
        }
        debug_assert_eq!(chunks.first().map(|c| c.start), Some(0));
        debug_assert_eq!(chunks.last().map(|c| c.end), Some(len));
        log_debug!(
            "[partitioner] Fanning out {len} elements over {} chunks",
            chunks.len()
        );

        let task = FanOutTask {
            next_chunk: CachePadded::new(AtomicUsize::new(0)),
            slots: chunks.iter().map(|_| Mutex::new(None)).collect(),
            chunks: &chunks,
            worker: &worker,
        };
        self.pool.run_round(&task);

        // Fan in: every slot has settled; keep outputs in chunk order.
        let mut outputs = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();
        for (index, slot) in task.slots.into_iter().enumerate() {
            let settled = slot
                .into_inner()
                .unwrap()
                .expect("chunk neither completed nor panicked");
            match settled {
                Ok(output) => outputs.push((index, output)),
                Err(payload) => failures.push((index, payload)),
            }
        }

        if failures.is_empty() {
            return outputs.into_iter().map(|(_, out)| out).collect();
        }

        #[cfg(feature = "log_parallelism")]
        log_info!(
            "[partitioner] {} of {} chunks panicked",
            failures.len(),
            chunks.len()
        );
        // Successful chunks may have produced side effects that must be
        // undone before reporting the failure.
        for (index, _) in &outputs {
            cleanup(chunks[*index].clone());
        }
        drop(outputs);
        std::panic::panic_any(PanicBundle::new(failures));
    }
}

/// One round's shared state: workers claim chunk indices from the counter
/// until none are left.
struct FanOutTask<'a, Out, W> {
    /// Next unclaimed chunk index.
    next_chunk: CachePadded<AtomicUsize>,
    /// One settled outcome per chunk, indexed by chunk position.
    slots: Vec<Mutex<Option<std::thread::Result<Out>>>>,
    /// The chunk ranges of this invocation.
    chunks: &'a [Range<usize>],
    /// The per-chunk worker function.
    worker: &'a W,
}

impl<Out, W> WorkerTask for FanOutTask<'_, Out, W>
where
    Out: Send,
    W: Fn(usize, Range<usize>) -> Out + Sync,
{
    fn run(&self, _worker_id: usize) {
        loop {
            let index = self.next_chunk.fetch_add(1, Ordering::Relaxed);
            if index >= self.chunks.len() {
                return;
            }
            let range = self.chunks[index].clone();
            // Contain user-code panics here: the pool worker itself must
            // keep claiming chunks so every chunk settles.
            let outcome = catch_unwind(AssertUnwindSafe(|| (self.worker)(index, range)));
            *self.slots[index].lock().unwrap() = Some(outcome);
        }
    }
}
