// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A persistent worker pool executing borrowed fan-out tasks.
//!
//! The pool is the executor collaborator of the partitioner: it runs "one
//! round per algorithm invocation", where a round consists of every worker
//! claiming and processing chunks from a shared task object until none are
//! left. The pool itself knows nothing about algorithms or chunking.

use super::sync::{make_job_board, Poster, RoundOutcome, Taker};
use super::util::WithLifetime;
use crate::macros::{log_debug, log_error, log_warn};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::convert::TryFrom;
use std::num::NonZeroUsize;
use std::thread::JoinHandle;

/// Number of threads to spawn in a thread pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on
    /// this platform (or not implemented), building a thread pool will
    /// panic.
    Always,
}

/// A builder for [`ThreadPool`].
pub struct ThreadPoolBuilder {
    /// Number of worker threads to spawn in the pool.
    pub num_threads: ThreadCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
}

impl ThreadPoolBuilder {
    /// Spawns a thread pool.
    ///
    /// ```
    /// # use parstd::{count, Par, CpuPinningPolicy, ThreadCount, ThreadPoolBuilder};
    /// let mut pool = ThreadPoolBuilder {
    ///     num_threads: ThreadCount::AvailableParallelism,
    ///     cpu_pinning: CpuPinningPolicy::No,
    /// }
    /// .build();
    ///
    /// let input = [1, 2, 2, 3, 2];
    /// assert_eq!(count(Par::new(&mut pool), &input, &2), 3);
    /// ```
    pub fn build(&self) -> ThreadPool {
        ThreadPool::new(self)
    }
}

/// A unit of work run by every pool worker during one round.
///
/// The same task object is visible to all workers; implementations
/// coordinate internally (the partitioner uses an atomic chunk counter).
pub(crate) trait WorkerTask {
    /// Runs this task on the worker with the given index.
    fn run(&self, worker_id: usize);
}

/// Proxy representing `dyn WorkerTask + Sync` at any lifetime, so that a
/// borrowed task can be posted to the persistent workers.
pub(crate) struct DynWorkerTask;

impl WithLifetime for DynWorkerTask {
    type T<'a> = dyn WorkerTask + Sync + 'a;
}

/// A pool of persistent worker threads executing parallel algorithm rounds.
///
/// Build one with [`ThreadPoolBuilder::build()`] and attach it to a parallel
/// execution policy ([`Par::new()`](crate::Par::new),
/// [`ParUnseq::new()`](crate::ParUnseq::new) or
/// [`ParTask::new()`](crate::ParTask::new)).
pub struct ThreadPool {
    /// Handles to all the worker threads in the pool.
    threads: Vec<WorkerThreadHandle>,
    /// Main-thread side of the job board.
    board: Poster<DynWorkerTask>,
}

/// Handle to a worker thread in a thread pool.
struct WorkerThreadHandle {
    /// Thread handle object.
    handle: JoinHandle<()>,
}

impl ThreadPool {
    /// Creates a new thread pool using the given parameters.
    fn new(builder: &ThreadPoolBuilder) -> Self {
        let num_threads: NonZeroUsize = match builder.num_threads {
            ThreadCount::AvailableParallelism => std::thread::available_parallelism()
                .expect("Getting the available parallelism failed"),
            ThreadCount::Count(count) => count,
        };
        let num_threads: usize = num_threads.into();
        let cpu_pinning = builder.cpu_pinning;

        let (poster, takers) = make_job_board(num_threads);

        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => {
                panic!("Pinning threads to CPUs is not implemented on this platform.")
            }
        }

        let threads = takers
            .into_iter()
            .enumerate()
            .map(|(id, taker)| {
                let mut context = WorkerContext { id, board: taker };
                WorkerThreadHandle {
                    handle: std::thread::spawn(move || {
                        #[cfg(all(
                            not(miri),
                            any(
                                target_os = "android",
                                target_os = "dragonfly",
                                target_os = "freebsd",
                                target_os = "linux"
                            )
                        ))]
                        match cpu_pinning {
                            CpuPinningPolicy::No => (),
                            CpuPinningPolicy::IfSupported => {
                                let mut cpu_set = CpuSet::new();
                                if let Err(_e) = cpu_set.set(id) {
                                    log_warn!("Failed to set CPU affinity for worker #{id}: {_e}");
                                } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set)
                                {
                                    log_warn!("Failed to set CPU affinity for worker #{id}: {_e}");
                                } else {
                                    log_debug!("Pinned worker #{id} to CPU #{id}");
                                }
                            }
                            CpuPinningPolicy::Always => {
                                let mut cpu_set = CpuSet::new();
                                if let Err(e) = cpu_set.set(id) {
                                    panic!("Failed to set CPU affinity for worker #{id}: {e}");
                                } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set)
                                {
                                    panic!("Failed to set CPU affinity for worker #{id}: {e}");
                                } else {
                                    log_debug!("Pinned worker #{id} to CPU #{id}");
                                }
                            }
                        }
                        context.run()
                    }),
                }
            })
            .collect();
        log_debug!("[main thread] Spawned {num_threads} pool workers");

        Self {
            threads,
            board: poster,
        }
    }

    /// Returns the number of worker threads spawned in this pool.
    pub fn num_threads(&self) -> NonZeroUsize {
        self.threads.len().try_into().unwrap()
    }

    /// Runs one round: every worker executes the given task, and this call
    /// returns once all of them are done with it.
    pub(crate) fn run_round(&mut self, task: &(dyn WorkerTask + Sync)) {
        self.board.post(task);
    }
}

impl Drop for ThreadPool {
    /// Joins all the threads in the pool.
    #[allow(clippy::single_match, clippy::unused_enumerate_index)]
    fn drop(&mut self) {
        self.board.close();

        log_debug!("[main thread] Joining workers in the pool...");
        for (_i, t) in self.threads.drain(..).enumerate() {
            let result = t.handle.join();
            match result {
                Ok(_) => log_debug!("[main thread] Worker {_i} joined with result: {result:?}"),
                Err(_) => log_error!("[main thread] Worker {_i} joined with result: {result:?}"),
            }
        }
        log_debug!("[main thread] Joined workers.");
    }
}

/// Context object owned by a worker thread.
struct WorkerContext {
    /// Worker index.
    id: usize,
    /// Worker-side handle to the job board.
    board: Taker<DynWorkerTask>,
}

impl WorkerContext {
    /// Main loop run by a worker thread.
    fn run(&mut self) {
        loop {
            match self.board.take(|task| {
                task.run(self.id);
            }) {
                RoundOutcome::Finished => break,
                RoundOutcome::Ran => continue,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountRuns {
        runs: AtomicUsize,
    }

    impl WorkerTask for CountRuns {
        fn run(&self, _worker_id: usize) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn thread_count_try_from_usize() {
        assert!(ThreadCount::try_from(0).is_err());
        assert_eq!(
            ThreadCount::try_from(1),
            Ok(ThreadCount::Count(NonZeroUsize::try_from(1).unwrap()))
        );
    }

    #[test]
    fn num_threads_matches_builder() {
        let pool = ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(4).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build();
        assert_eq!(pool.num_threads(), NonZeroUsize::try_from(4).unwrap());

        let pool = ThreadPoolBuilder {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build();
        assert_eq!(
            pool.num_threads(),
            std::thread::available_parallelism().unwrap()
        );
    }

    #[test]
    fn every_worker_runs_each_round() {
        let mut pool = ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(3).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build();

        let task = CountRuns {
            runs: AtomicUsize::new(0),
        };
        pool.run_round(&task);
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);

        // The pool is reusable for the next round.
        pool.run_round(&task);
        assert_eq!(task.runs.load(Ordering::SeqCst), 6);
    }

    #[cfg(any(
        miri,
        not(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        ))
    ))]
    #[test]
    #[should_panic = "Pinning threads to CPUs is not implemented on this platform."]
    fn cpu_pinning_always_unsupported_panics() {
        ThreadPoolBuilder {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::Always,
        }
        .build();
    }
}
