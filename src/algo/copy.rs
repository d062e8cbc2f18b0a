// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Copying and exchanging algorithms. Output positions are known up front
//! (except for [`copy_if`]), so partitions write disjoint ranges of the
//! destination directly through a [`RawSlice`].

use crate::core::pack::LoopDriver;
use crate::core::util::RawSlice;
use crate::policy::ExecutionPolicy;
use std::mem::{self, MaybeUninit};

/// Clones `src` into `dst` index-aligned, over the shorter of the two
/// lengths. Returns the number of elements written.
pub fn copy<'data, T, P>(policy: P, src: &'data [T], dst: &'data mut [T]) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
    P::Driver: LoopDriver<T>,
{
    policy.execute(move |partitioner| {
        let n = src.len().min(dst.len());
        match partitioner {
            None => <P::Driver as LoopDriver<T>>::copy_run(&src[..n], &mut dst[..n]),
            Some(mut partitioner) => {
                let out = RawSlice::new(&mut dst[..n]);
                partitioner.run(n, |_, range| {
                    // SAFETY: chunk ranges are disjoint, one worker each.
                    let run = unsafe { out.slice_mut(range.clone()) };
                    <P::Driver as LoopDriver<T>>::copy_run(&src[range], run);
                });
            }
        }
        n
    })
}

/// Clones the first `n` elements of `src` into `dst`. `n` is clamped to both
/// lengths, so a zero count is a no-op. Returns the number written.
pub fn copy_n<'data, T, P>(
    policy: P,
    src: &'data [T],
    n: usize,
    dst: &'data mut [T],
) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
    P::Driver: LoopDriver<T>,
{
    copy(policy, &src[..n.min(src.len())], dst)
}

/// Clones the elements of `src` satisfying `pred` into a prefix of `dst`,
/// preserving their relative order. Returns the number written.
///
/// Panics if `dst` is too short for the selected elements.
pub fn copy_if<'data, T, P, F>(
    policy: P,
    src: &'data [T],
    dst: &'data mut [T],
    pred: F,
) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
    F: Fn(&T) -> bool + Send + Sync + 'data,
{
    policy.execute(move |partitioner| match partitioner {
        None => {
            let mut written = 0;
            for x in src {
                if pred(x) {
                    dst[written] = x.clone();
                    written += 1;
                }
            }
            written
        }
        Some(mut partitioner) => {
            // Output positions depend on every earlier chunk's count, so the
            // parallel phase gathers per chunk and placement is a single
            // pass over the (in chunk order) gathered runs.
            let gathered = partitioner.run(src.len(), |_, range| {
                src[range]
                    .iter()
                    .filter(|x| pred(x))
                    .cloned()
                    .collect::<Vec<T>>()
            });
            let total: usize = gathered.iter().map(Vec::len).sum();
            assert!(
                total <= dst.len(),
                "destination holds {} elements but {total} were selected",
                dst.len(),
            );
            let mut written = 0;
            for run in gathered {
                dst[written..written + run.len()].clone_from_slice(&run);
                written += run.len();
            }
            written
        }
    })
}

/// Swaps `a[i]` with `b[i]` over the shorter of the two lengths. Returns the
/// number of swapped pairs.
pub fn swap_ranges<'data, T, P>(
    policy: P,
    a: &'data mut [T],
    b: &'data mut [T],
) -> P::Result<usize>
where
    T: Send,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let n = a.len().min(b.len());
        match partitioner {
            None => a[..n].swap_with_slice(&mut b[..n]),
            Some(mut partitioner) => {
                let left = RawSlice::new(&mut a[..n]);
                let right = RawSlice::new(&mut b[..n]);
                partitioner.run(n, |_, range| {
                    // SAFETY: chunk ranges are disjoint, one worker each,
                    // and `a` and `b` are distinct exclusive borrows.
                    unsafe {
                        left.slice_mut(range.clone())
                            .swap_with_slice(right.slice_mut(range));
                    }
                });
            }
        }
        n
    })
}

/// Drops the initialized prefix of a run on unwind. Disarmed by forgetting
/// once the whole run is constructed.
struct PrefixGuard<'a, T> {
    run: &'a mut [MaybeUninit<T>],
    init: usize,
}

impl<T> Drop for PrefixGuard<'_, T> {
    fn drop(&mut self) {
        for slot in &mut self.run[..self.init] {
            // SAFETY: exactly the first `init` slots were written.
            unsafe { slot.assume_init_drop() };
        }
    }
}

/// Clone-constructs `src` into the uninitialized storage `dst`, over the
/// shorter of the two lengths. Returns the number of elements constructed,
/// all of which are initialized on return.
///
/// If any clone panics, every element constructed by the call (in any
/// partition) is dropped before the panic is re-raised, leaving `dst`
/// uninitialized throughout.
pub fn uninitialized_copy<'data, T, P>(
    policy: P,
    src: &'data [T],
    dst: &'data mut [MaybeUninit<T>],
) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let n = src.len().min(dst.len());
        match partitioner {
            None => {
                let mut guard = PrefixGuard {
                    run: &mut dst[..n],
                    init: 0,
                };
                for x in &src[..n] {
                    guard.run[guard.init].write(x.clone());
                    guard.init += 1;
                }
                mem::forget(guard);
            }
            Some(mut partitioner) => {
                let out = RawSlice::new(&mut dst[..n]);
                partitioner.run_with_cleanup(
                    n,
                    |_, range| {
                        // SAFETY: chunk ranges are disjoint, one worker each.
                        let run = unsafe { out.slice_mut(range.clone()) };
                        let mut guard = PrefixGuard { run, init: 0 };
                        for x in &src[range] {
                            guard.run[guard.init].write(x.clone());
                            guard.init += 1;
                        }
                        mem::forget(guard);
                    },
                    |range| {
                        // SAFETY: only fully constructed chunks are cleaned
                        // up, and the failed round is over, so no worker
                        // still touches this range.
                        for slot in unsafe { out.slice_mut(range) } {
                            unsafe { slot.assume_init_drop() };
                        }
                    },
                );
            }
        }
        n
    })
}

/// [`uninitialized_copy`] over the first `n` elements of `src`, with `n`
/// clamped to both lengths.
pub fn uninitialized_copy_n<'data, T, P>(
    policy: P,
    src: &'data [T],
    n: usize,
    dst: &'data mut [MaybeUninit<T>],
) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
{
    uninitialized_copy(policy, &src[..n.min(src.len())], dst)
}
