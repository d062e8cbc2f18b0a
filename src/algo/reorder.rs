// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reversal and rotation algorithms.

use crate::core::partition::Partitioner;
use crate::core::util::RawSlice;
use crate::policy::ExecutionPolicy;
use std::mem;

/// Swaps `run[i]` with `run[len - 1 - i]` over the first half, fanned out
/// over the partitioner.
fn par_reverse<T: Send>(partitioner: &mut Partitioner<'_>, run: &mut [T]) {
    let len = run.len();
    let view = RawSlice::new(run);
    partitioner.run(len / 2, |_, range| {
        for i in range {
            let j = len - 1 - i;
            // SAFETY: i ranges over a disjoint chunk of the first half and
            // j mirrors it in the second half, so no pair overlaps another.
            unsafe {
                mem::swap(&mut view.slice_mut(i..i + 1)[0], &mut view.slice_mut(j..j + 1)[0]);
            }
        }
    });
}

/// Reverses `run` in place.
pub fn reverse<'data, T, P>(policy: P, run: &'data mut [T]) -> P::Result<()>
where
    T: Send,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| match partitioner {
        None => run.reverse(),
        Some(mut partitioner) => par_reverse(&mut partitioner, run),
    })
}

/// Clones `src` into `dst` in reverse order (`dst[len - 1 - i] = src[i]`).
///
/// Panics if `dst` is shorter than `src`; `src` and `dst` must not overlap.
pub fn reverse_copy<'data, T, P>(policy: P, src: &'data [T], dst: &'data mut [T]) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let n = src.len();
        assert!(
            dst.len() >= n,
            "destination holds {} elements but {n} are copied",
            dst.len(),
        );
        match partitioner {
            None => {
                for (i, x) in src.iter().enumerate() {
                    dst[n - 1 - i] = x.clone();
                }
            }
            Some(mut partitioner) => {
                let out = RawSlice::new(&mut dst[..n]);
                partitioner.run(n, |_, range| {
                    for i in range {
                        // SAFETY: `n - 1 - i` is a bijection, so chunk
                        // writes stay disjoint.
                        unsafe {
                            out.slice_mut(n - 1 - i..n - i)[0] = src[i].clone();
                        }
                    }
                });
            }
        }
        n
    })
}

/// Rotates `run` left so that the element at `mid` becomes the first one.
/// Quadratic-free: three reversals, each fanned out.
///
/// Panics if `mid > run.len()`.
pub fn rotate<'data, T, P>(policy: P, run: &'data mut [T], mid: usize) -> P::Result<()>
where
    T: Send,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        assert!(mid <= run.len(), "mid {mid} out of bounds for length {}", run.len());
        match partitioner {
            None => run.rotate_left(mid),
            Some(mut partitioner) => {
                par_reverse(&mut partitioner, &mut run[..mid]);
                par_reverse(&mut partitioner, &mut run[mid..]);
                par_reverse(&mut partitioner, run);
            }
        }
    })
}

/// Clones `src` rotated left by `mid` into `dst`: first `src[mid..]`, then
/// `src[..mid]`. Returns the number of elements written.
///
/// Panics if `mid > src.len()` or `dst` is shorter than `src`.
pub fn rotate_copy<'data, T, P>(
    policy: P,
    src: &'data [T],
    mid: usize,
    dst: &'data mut [T],
) -> P::Result<usize>
where
    T: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let n = src.len();
        assert!(mid <= n, "mid {mid} out of bounds for length {n}");
        assert!(
            dst.len() >= n,
            "destination holds {} elements but {n} are copied",
            dst.len(),
        );
        let tail = n - mid;
        match partitioner {
            None => {
                dst[..tail].clone_from_slice(&src[mid..]);
                dst[tail..n].clone_from_slice(&src[..mid]);
            }
            Some(mut partitioner) => {
                let out = RawSlice::new(&mut dst[..n]);
                partitioner.run(tail, |_, range| {
                    // SAFETY: disjoint chunks of `dst[..tail]`.
                    let run = unsafe { out.slice_mut(range.clone()) };
                    run.clone_from_slice(&src[mid + range.start..mid + range.end]);
                });
                partitioner.run(mid, |_, range| {
                    // SAFETY: disjoint chunks of `dst[tail..n]`.
                    let run = unsafe { out.slice_mut(tail + range.start..tail + range.end) };
                    run.clone_from_slice(&src[range]);
                });
            }
        }
        n
    })
}
