// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution policies: the caller-supplied tags selecting concurrency mode
//! (sequential, parallel, vectorized) and synchrony (immediate value or
//! deferred job) of an algorithm call.
//!
//! Every algorithm front-end supplies one body to
//! [`ExecutionPolicy::execute`]; the policy decides whether the body runs
//! inline and sequentially (no [`Partitioner`]) or fans out over a pool, and
//! whether the caller gets the value back directly or as a [`Job`] to join
//! later.

use crate::core::pack::{PackedDriver, ScalarDriver};
use crate::core::partition::{ChunkParams, Partitioner};
use crate::core::pool::ThreadPool;
use std::thread::{Scope, ScopedJoinHandle};

/// A policy for executing slice algorithms.
///
/// The `'data` lifetime bounds everything an algorithm invocation borrows
/// (its input and output slices, predicates, values). Synchronous policies
/// collapse [`Result<R>`](Self::Result) to `R`; task policies produce a
/// [`Job`] whose [`join()`](Job::join) yields `R` or re-raises the
/// invocation's aggregated panic.
pub trait ExecutionPolicy<'data>: Sized {
    /// Inner-loop driver: [`ScalarDriver`] or [`PackedDriver`].
    type Driver;

    /// Policy-dependent envelope for an algorithm result.
    type Result<R: Send + 'data>;

    /// Runs an algorithm body.
    ///
    /// Sequential policies call `body` inline with `None`; parallel policies
    /// hand it a [`Partitioner`] over their pool, either inline (blocking
    /// until the fan-in completes) or on a scheduled task for asynchronous
    /// policies. The body picks its sequential or partitioned code path off
    /// the argument.
    fn execute<R, B>(self, body: B) -> Self::Result<R>
    where
        R: Send + 'data,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'data;
}

/// Sequential execution on the calling thread, scalar loops.
///
/// This is the implicit policy of the no-policy convenience methods in
/// [`ext`](crate::ext).
#[derive(Clone, Copy, Debug, Default)]
pub struct Seq;

impl<'data> ExecutionPolicy<'data> for Seq {
    type Driver = ScalarDriver;
    type Result<R: Send + 'data> = R;

    fn execute<R, B>(self, body: B) -> R
    where
        R: Send + 'data,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'data,
    {
        body(None)
    }
}

/// Sequential execution with vectorized inner loops.
///
/// Requires the element type to satisfy the [`Pack`](crate::Pack) contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unseq;

impl<'data> ExecutionPolicy<'data> for Unseq {
    type Driver = PackedDriver;
    type Result<R: Send + 'data> = R;

    fn execute<R, B>(self, body: B) -> R
    where
        R: Send + 'data,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'data,
    {
        body(None)
    }
}

/// Parallel synchronous execution on a [`ThreadPool`], scalar loops.
///
/// The call blocks until every partition has settled and the partial
/// results are merged.
pub struct Par<'pool> {
    pool: &'pool mut ThreadPool,
    params: ChunkParams,
}

impl<'pool> Par<'pool> {
    /// Attaches the policy to a pool, with default executor parameters.
    pub fn new(pool: &'pool mut ThreadPool) -> Self {
        Self {
            pool,
            params: ChunkParams::default(),
        }
    }

    /// Caps the number of chunks the partitioner may create.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.params.max_chunks = Some(max_chunks);
        self
    }

    /// Sets the minimum number of elements per chunk.
    pub fn with_min_chunk_len(mut self, min_chunk_len: usize) -> Self {
        self.params.min_chunk_len = min_chunk_len;
        self
    }
}

impl<'data, 'pool> ExecutionPolicy<'data> for Par<'pool> {
    type Driver = ScalarDriver;
    type Result<R: Send + 'data> = R;

    fn execute<R, B>(self, body: B) -> R
    where
        R: Send + 'data,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'data,
    {
        body(Some(Partitioner::new(self.pool, self.params)))
    }
}

/// Parallel synchronous execution with vectorized inner loops.
pub struct ParUnseq<'pool> {
    pool: &'pool mut ThreadPool,
    params: ChunkParams,
}

impl<'pool> ParUnseq<'pool> {
    /// Attaches the policy to a pool, with default executor parameters.
    pub fn new(pool: &'pool mut ThreadPool) -> Self {
        Self {
            pool,
            params: ChunkParams::default(),
        }
    }

    /// Caps the number of chunks the partitioner may create.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.params.max_chunks = Some(max_chunks);
        self
    }

    /// Sets the minimum number of elements per chunk.
    pub fn with_min_chunk_len(mut self, min_chunk_len: usize) -> Self {
        self.params.min_chunk_len = min_chunk_len;
        self
    }
}

impl<'data, 'pool> ExecutionPolicy<'data> for ParUnseq<'pool> {
    type Driver = PackedDriver;
    type Result<R: Send + 'data> = R;

    fn execute<R, B>(self, body: B) -> R
    where
        R: Send + 'data,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'data,
    {
        body(Some(Partitioner::new(self.pool, self.params)))
    }
}

/// Parallel asynchronous execution: the algorithm call returns a [`Job`]
/// immediately, and the fan-out/fan-in runs on a thread spawned in the
/// caller's [`Scope`].
///
/// ```
/// # use parstd::{count, ParTask, ThreadCount, CpuPinningPolicy, ThreadPoolBuilder};
/// let mut pool = ThreadPoolBuilder {
///     num_threads: ThreadCount::try_from(2).unwrap(),
///     cpu_pinning: CpuPinningPolicy::No,
/// }
/// .build();
///
/// let input = [1, 2, 2, 3, 2];
/// let total = std::thread::scope(|scope| {
///     let job = count(ParTask::new(scope, &mut pool), &input, &2);
///     // ... other work here ...
///     job.join()
/// });
/// assert_eq!(total, 3);
/// ```
pub struct ParTask<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    pool: &'env mut ThreadPool,
    params: ChunkParams,
}

impl<'scope, 'env> ParTask<'scope, 'env> {
    /// Attaches the policy to a scope and a pool, with default executor
    /// parameters.
    pub fn new(scope: &'scope Scope<'scope, 'env>, pool: &'env mut ThreadPool) -> Self {
        Self {
            scope,
            pool,
            params: ChunkParams::default(),
        }
    }

    /// Caps the number of chunks the partitioner may create.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.params.max_chunks = Some(max_chunks);
        self
    }

    /// Sets the minimum number of elements per chunk.
    pub fn with_min_chunk_len(mut self, min_chunk_len: usize) -> Self {
        self.params.min_chunk_len = min_chunk_len;
        self
    }
}

impl<'scope, 'env> ExecutionPolicy<'env> for ParTask<'scope, 'env> {
    type Driver = ScalarDriver;
    type Result<R: Send + 'env> = Job<'scope, R>;

    fn execute<R, B>(self, body: B) -> Job<'scope, R>
    where
        R: Send + 'env,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'env,
    {
        let Self {
            scope,
            pool,
            params,
        } = self;
        Job {
            handle: scope.spawn(move || body(Some(Partitioner::new(pool, params)))),
        }
    }
}

/// [`ParTask`] with vectorized inner loops.
pub struct ParUnseqTask<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    pool: &'env mut ThreadPool,
    params: ChunkParams,
}

impl<'scope, 'env> ParUnseqTask<'scope, 'env> {
    /// Attaches the policy to a scope and a pool, with default executor
    /// parameters.
    pub fn new(scope: &'scope Scope<'scope, 'env>, pool: &'env mut ThreadPool) -> Self {
        Self {
            scope,
            pool,
            params: ChunkParams::default(),
        }
    }
}

impl<'scope, 'env> ExecutionPolicy<'env> for ParUnseqTask<'scope, 'env> {
    type Driver = PackedDriver;
    type Result<R: Send + 'env> = Job<'scope, R>;

    fn execute<R, B>(self, body: B) -> Job<'scope, R>
    where
        R: Send + 'env,
        B: FnOnce(Option<Partitioner<'_>>) -> R + Send + 'env,
    {
        let Self {
            scope,
            pool,
            params,
        } = self;
        Job {
            handle: scope.spawn(move || body(Some(Partitioner::new(pool, params)))),
        }
    }
}

/// A deferred algorithm result produced by a task policy.
///
/// The underlying work starts immediately; this handle only defers
/// retrieval. Dropping the handle without joining does not cancel the work
/// (the owning scope still joins it at the end).
#[must_use = "a job's result (or panic) is only delivered when joined"]
pub struct Job<'scope, R> {
    handle: ScopedJoinHandle<'scope, R>,
}

impl<'scope, R> Job<'scope, R> {
    /// Returns true once the job has settled (completed or panicked).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the job settles, returning its value or re-raising the
    /// panic captured from the run (a
    /// [`PanicBundle`](crate::PanicBundle) if partitions failed).
    pub fn join(self) -> R {
        match self.handle.join() {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::pool::{CpuPinningPolicy, ThreadCount, ThreadPoolBuilder};

    fn pool(workers: usize) -> ThreadPool {
        ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(workers).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build()
    }

    #[test]
    fn sequential_policies_get_no_partitioner() {
        assert!(Seq.execute(|p| p.is_none()));
        assert!(Unseq.execute(|p| p.is_none()));
    }

    #[test]
    fn parallel_policies_get_a_partitioner() {
        let mut pool = pool(2);
        assert!(Par::new(&mut pool).execute(|p| p.is_some()));
        assert!(ParUnseq::new(&mut pool).execute(|p| p.is_some()));
    }

    #[test]
    fn task_policy_defers_the_value() {
        let mut pool = pool(2);
        let value = std::thread::scope(|scope| {
            let job: Job<'_, usize> = ParTask::new(scope, &mut pool).execute(|partitioner| {
                let mut partitioner = partitioner.unwrap();
                partitioner.run(10, |_, range| range.len()).iter().sum()
            });
            job.join()
        });
        assert_eq!(value, 10usize);
    }

    #[test]
    fn task_policy_delivers_panics_at_join() {
        let mut pool = pool(2);
        let result = std::thread::scope(|scope| {
            let job: Job<'_, usize> =
                ParTask::new(scope, &mut pool).execute(|_| panic!("deferred failure"));
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job.join()))
        });
        let payload = result.unwrap_err();
        assert_eq!(
            payload.downcast_ref::<&'static str>().copied(),
            Some("deferred failure")
        );
    }

    #[test]
    fn chunk_param_builders_apply() {
        let mut pool = pool(4);
        let chunks = Par::new(&mut pool)
            .with_max_chunks(2)
            .execute(|p| p.unwrap().chunk_ranges(100));
        assert_eq!(chunks.len(), 2);

        let chunks = Par::new(&mut pool)
            .with_min_chunk_len(60)
            .execute(|p| p.unwrap().chunk_ranges(100));
        assert_eq!(chunks.len(), 1);
    }
}
