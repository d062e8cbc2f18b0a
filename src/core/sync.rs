// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The job board: a synchronization primitive that lets the main thread post
//! a borrowed task object to a fixed set of worker threads and wait for all
//! of them to finish the round.

use super::util::{ErasedRef, Signal, WithLifetime};
use crate::macros::{log_debug, log_error};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Outcome of a worker's round on the job board.
#[derive(Clone, Copy)]
pub enum RoundOutcome {
    /// A task was posted and has been run; the worker should wait for the
    /// next round.
    Ran,
    /// The main thread closed the board; the worker should exit.
    Finished,
}

/// Status of the main thread in the posting protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainStatus {
    /// Waiting for the workers to finish the current round.
    Waiting,
    /// All workers are done; the main thread may prepare the next round.
    Ready,
}

/// Status broadcast to the workers.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BoardStatus {
    /// A task of the given parity is posted and must be run.
    Round(Parity),
    /// The board is closed and the workers must exit.
    Closed,
}

/// Tag distinguishing two successive rounds, so that a worker that finished
/// early cannot re-run the same round's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    Even,
    Odd,
}

impl Parity {
    fn flip(&mut self) {
        *self = match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }
}

/// Creates a [`Poster`] paired with `num_workers` [`Taker`]s.
pub fn make_job_board<T: WithLifetime>(num_workers: usize) -> (Poster<T>, Vec<Taker<T>>) {
    let parity = Parity::Even;
    let shared = Arc::new(Board {
        active_workers: CachePadded::new(AtomicUsize::new(0)),
        panicked_workers: CachePadded::new(AtomicUsize::new(0)),
        board_status: Signal::new(BoardStatus::Round(parity)),
        main_status: Signal::new(MainStatus::Waiting),
        task: RwLock::new(ErasedRef::empty()),
    });

    let takers = (0..num_workers)
        .map(|_id| Taker {
            #[cfg(feature = "log")]
            id: _id,
            parity,
            shared: shared.clone(),
        })
        .collect();

    let poster = Poster {
        num_workers,
        parity,
        shared,
    };

    (poster, takers)
}

/// State shared between the main thread and the workers.
struct Board<T: WithLifetime> {
    /// Number of workers still active in the current round.
    active_workers: CachePadded<AtomicUsize>,
    /// Number of workers that panicked in the current round.
    panicked_workers: CachePadded<AtomicUsize>,
    /// Status broadcast to the workers.
    board_status: Signal<BoardStatus>,
    /// Status of the main thread.
    main_status: Signal<MainStatus>,
    /// The task currently visible to the workers.
    task: RwLock<ErasedRef<T>>,
}

/// Main-thread handle: posts borrowed tasks to the workers.
pub struct Poster<T: WithLifetime> {
    /// Number of workers on the board.
    num_workers: usize,
    /// Parity of the current round.
    parity: Parity,
    /// State shared with the workers.
    shared: Arc<Board<T>>,
}

impl<T: WithLifetime> Poster<T> {
    /// Posts the given task to the workers and blocks until every worker has
    /// finished running it.
    pub fn post(&mut self, task: &T::T<'_>) {
        self.shared
            .active_workers
            .store(self.num_workers, Ordering::SeqCst);

        self.parity.flip();
        let parity = self.parity;

        // The reference stored here is valid until the `clear()` at the end
        // of this function, which happens after all workers reported done
        // (synchronized through `main_status`).
        self.shared.task.write().unwrap().set(task);
        log_debug!("[main thread, round {parity:?}] Posted a task to the board.");

        self.shared
            .board_status
            .notify_all(BoardStatus::Round(parity));

        let mut guard = self
            .shared
            .main_status
            .wait_while(|status| *status == MainStatus::Waiting);
        assert_eq!(*guard, MainStatus::Ready);

        let panicked_workers = self.shared.panicked_workers.load(Ordering::SeqCst);
        if panicked_workers != 0 {
            log_error!(
                "[main thread, round {parity:?}] {panicked_workers} worker thread(s) panicked!"
            );
            panic!("{panicked_workers} worker thread(s) panicked!");
        }

        *guard = MainStatus::Waiting;
        drop(guard);

        log_debug!("[main thread, round {parity:?}] All workers finished the round.");
        self.shared.task.write().unwrap().clear();
    }

    /// Closes the board, telling all workers to exit.
    pub fn close(&mut self) {
        log_debug!("[main thread] Closing the job board...");
        self.shared.board_status.notify_all(BoardStatus::Closed);
    }
}

/// Worker-side handle: waits for posted tasks and runs them.
pub struct Taker<T: WithLifetime> {
    /// Worker index.
    #[cfg(feature = "log")]
    id: usize,
    /// Parity of the current round.
    parity: Parity,
    /// State shared with the main thread.
    shared: Arc<Board<T>>,
}

impl<T: WithLifetime> Taker<T> {
    /// Waits for the next round and runs `f` on the posted task.
    ///
    /// Returns [`RoundOutcome::Finished`] without running `f` if the main
    /// thread closed the board instead.
    pub fn take(&mut self, f: impl FnOnce(&T::T<'_>)) -> RoundOutcome {
        self.parity.flip();
        let parity = self.parity;

        let board_status: BoardStatus =
            *self
                .shared
                .board_status
                .wait_while(|status| match status {
                    BoardStatus::Closed => false,
                    BoardStatus::Round(p) => *p != parity,
                });
        match board_status {
            BoardStatus::Closed => {
                log_debug!("[worker {}, round {parity:?}] Board closed.", self.id);
                RoundOutcome::Finished
            }
            BoardStatus::Round(p) => {
                assert_eq!(parity, p);
                log_debug!("[worker {}, round {parity:?}] Running the posted task.", self.id);

                // Whether the task runs to completion or panics, the main
                // thread must learn that this worker is done with the task
                // reference. The done-guard's destructor reports it, also on
                // the unwind path.
                let done = DoneGuard {
                    #[cfg(feature = "log")]
                    id: self.id,
                    shared: &self.shared,
                };

                {
                    let guard = self.shared.task.read().unwrap();
                    // SAFETY:
                    // - The reference cannot outlive the posted task: the
                    //   main thread blocks in `post()` until every worker's
                    //   done-guard has been dropped.
                    // - The task is not mutated while posted; workers only
                    //   hold shared references.
                    let task = unsafe { guard.get().unwrap() };
                    f(task);
                }

                drop(done);

                RoundOutcome::Ran
            }
        }
    }
}

/// Reports round completion (or a panic) to the main thread on drop.
struct DoneGuard<'a, T: WithLifetime> {
    /// Worker index.
    #[cfg(feature = "log")]
    id: usize,
    /// State shared with the main thread.
    shared: &'a Board<T>,
}

impl<T: WithLifetime> Drop for DoneGuard<'_, T> {
    fn drop(&mut self) {
        // A panicking worker means the round's outputs are garbage; count it
        // so the main thread can refuse them.
        if std::thread::panicking() {
            log_error!(
                "[worker {}] Panic detected, notifying the main thread",
                self.id
            );
            self.shared.panicked_workers.fetch_add(1, Ordering::SeqCst);
        }

        let remaining = self.shared.active_workers.fetch_sub(1, Ordering::SeqCst);
        assert!(remaining > 0);

        if remaining == 1 {
            // Last worker out wakes the main thread.
            log_debug!("[worker {}] Last one out, waking the main thread.", self.id);
            match self.shared.main_status.try_notify_one(MainStatus::Ready) {
                Ok(_) => (),
                Err(e) => {
                    log_error!(
                        "[worker {}] Failed to notify the main thread, the mutex was poisoned: {e:?}",
                        self.id
                    );
                    panic!("Failed to notify the main thread, the mutex was poisoned: {e:?}");
                }
            }
        }
    }
}
