// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Sorting algorithms: parallel stable merge sort and partial sort into a
//! separate destination.

use crate::core::util::RawSlice;
use crate::policy::ExecutionPolicy;
use std::ops::Range;

/// Stable two-way merge of sorted runs `a` and `b` into `out`. Ties take
/// from `a`, which always holds the lower-indexed run.
fn merge_runs<T: Ord + Clone>(a: &[T], b: &[T], out: &mut [T]) {
    debug_assert_eq!(a.len() + b.len(), out.len());
    let (mut i, mut j) = (0, 0);
    for slot in out {
        if j >= b.len() || (i < a.len() && a[i] <= b[j]) {
            slot.clone_from(&a[i]);
            i += 1;
        } else {
            slot.clone_from(&b[j]);
            j += 1;
        }
    }
}

/// Sorts `run` in place; equal elements keep their relative order.
///
/// Parallel policies sort each chunk independently, then merge adjacent
/// sorted runs pairwise in rounds, ping-ponging between `run` and a scratch
/// buffer.
pub fn stable_sort<'data, T, P>(policy: P, run: &'data mut [T]) -> P::Result<()>
where
    T: Ord + Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let Some(mut partitioner) = partitioner else {
            run.sort();
            return;
        };
        let len = run.len();
        let mut runs = partitioner.chunk_ranges(len);
        if runs.len() <= 1 {
            run.sort();
            return;
        }

        {
            let view = RawSlice::new(run);
            partitioner.run(len, |_, range| {
                // SAFETY: chunk ranges are disjoint, one worker each.
                unsafe { view.slice_mut(range) }.sort();
            });
        }

        let mut scratch = run.to_vec();
        // Data starts in `run`; each merge round flips it to the other
        // buffer.
        let mut in_run = true;
        while runs.len() > 1 {
            let mut pairs: Vec<(Range<usize>, Range<usize>)> =
                Vec::with_capacity(runs.len() / 2 + 1);
            let mut merged = Vec::with_capacity(pairs.capacity());
            let mut k = 0;
            while k < runs.len() {
                if k + 1 < runs.len() {
                    pairs.push((runs[k].clone(), runs[k + 1].clone()));
                    merged.push(runs[k].start..runs[k + 1].end);
                    k += 2;
                } else {
                    // Odd run out: merged against nothing so it still moves
                    // to the other buffer.
                    pairs.push((runs[k].clone(), runs[k].end..runs[k].end));
                    merged.push(runs[k].clone());
                    k += 1;
                }
            }

            {
                let (src, dst) = if in_run {
                    (RawSlice::new(run), RawSlice::new(&mut scratch))
                } else {
                    (RawSlice::new(&mut scratch), RawSlice::new(run))
                };
                let pairs = &pairs[..];
                partitioner.run(pairs.len(), |_, pair_range| {
                    for (left, right) in &pairs[pair_range] {
                        // SAFETY: pair spans are disjoint across the round,
                        // and this round only reads `src` and writes `dst`.
                        unsafe {
                            merge_runs(
                                src.slice_ref(left.clone()),
                                src.slice_ref(right.clone()),
                                dst.slice_mut(left.start..right.end),
                            );
                        }
                    }
                });
            }
            runs = merged;
            in_run = !in_run;
        }

        if !in_run {
            let src = RawSlice::new(&mut scratch);
            let dst = RawSlice::new(run);
            partitioner.run(len, |_, range| {
                // SAFETY: disjoint chunks; `scratch` is read-only here.
                unsafe {
                    dst.slice_mut(range.clone())
                        .clone_from_slice(src.slice_ref(range));
                }
            });
        }
    })
}

/// Clones the `m = min(src.len(), dst.len())` smallest elements of `src`,
/// sorted ascending, into `dst[..m]`. Returns `m`.
///
/// Parallel policies sort each chunk, keep its `m` smallest, and resolve the
/// survivors with a final sort of at most `m * chunks` elements.
pub fn partial_sort_copy<'data, T, P>(
    policy: P,
    src: &'data [T],
    dst: &'data mut [T],
) -> P::Result<usize>
where
    T: Ord + Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let m = src.len().min(dst.len());
        if m == 0 {
            return 0;
        }
        match partitioner {
            None => {
                let mut sorted = src.to_vec();
                sorted.sort();
                dst[..m].clone_from_slice(&sorted[..m]);
            }
            Some(mut partitioner) => {
                let survivors = partitioner.run(src.len(), |_, range| {
                    let mut local = src[range].to_vec();
                    local.sort();
                    local.truncate(m);
                    local
                });
                let mut candidates: Vec<T> = survivors.into_iter().flatten().collect();
                candidates.sort();
                dst[..m].clone_from_slice(&candidates[..m]);
            }
        }
        m
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::pool::{CpuPinningPolicy, ThreadCount, ThreadPoolBuilder};
    use crate::policy::{Par, Seq};
    use crate::ThreadPool;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn pool(workers: usize) -> ThreadPool {
        ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(workers).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build()
    }

    #[test]
    fn stable_sort_matches_the_std_sort() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pool = pool(4);
        for len in [0, 1, 2, 10, 257, 4096] {
            let original: Vec<u64> = (0..len).map(|_| rng.random_range(0..1000)).collect();
            let mut expected = original.clone();
            expected.sort();

            let mut run = original;
            stable_sort(Par::new(&mut pool), &mut run);
            assert_eq!(run, expected);
        }
    }

    // Equal keys must keep their input order, however many merge rounds ran.
    #[test]
    fn stable_sort_keeps_ties_in_input_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        // Few distinct keys forces plenty of ties; the payload records the
        // input position.
        let original: Vec<(u8, u32)> = (0..5000)
            .map(|i| (rng.random_range(0..4), i))
            .collect();
        let mut expected = original.clone();
        expected.sort();

        let mut pool = pool(8);
        let mut run = original;
        stable_sort(Par::new(&mut pool), &mut run);
        assert_eq!(run, expected);
    }

    #[test]
    fn stable_sort_with_one_worker_still_sorts() {
        let mut pool = pool(1);
        let mut run = vec![5, 3, 9, 1, 4];
        stable_sort(Par::new(&mut pool), &mut run);
        assert_eq!(run, [1, 3, 4, 5, 9]);
    }

    #[test]
    fn partial_sort_copy_selects_the_smallest() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let src: Vec<i64> = (0..2000).map(|_| rng.random_range(-500..500)).collect();
        let mut expected = src.clone();
        expected.sort();

        let mut pool = pool(4);
        let mut dst = vec![0; 100];
        assert_eq!(partial_sort_copy(Par::new(&mut pool), &src, &mut dst), 100);
        assert_eq!(dst, expected[..100]);

        let mut dst = vec![0; 100];
        assert_eq!(partial_sort_copy(Seq, &src, &mut dst), 100);
        assert_eq!(dst, expected[..100]);
    }

    #[test]
    fn partial_sort_copy_with_a_roomy_destination_sorts_everything() {
        let src = [5, 1, 4, 2, 3];
        let mut dst = [0; 8];
        assert_eq!(partial_sort_copy(Seq, &src, &mut dst), 5);
        assert_eq!(dst, [1, 2, 3, 4, 5, 0, 0, 0]);

        let empty: [i32; 0] = [];
        let mut dst = [0; 4];
        assert_eq!(partial_sort_copy(Seq, &empty, &mut dst), 0);
    }
}
