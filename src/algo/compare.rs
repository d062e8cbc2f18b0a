// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Comparison and search algorithms. These are early-exit scans: partitions
//! share a [`CancelToken`] and race to record the leftmost decisive index,
//! and the front-end reads the verdict off the token afterwards.

use crate::core::cancel::CancelToken;
use crate::core::loops::bounded_loop;
use crate::core::pack::LoopDriver;
use crate::policy::ExecutionPolicy;
use std::ops::ControlFlow;
use std::ops::Range;

/// Scans `a[range]` against `b[range]` in driver-sized blocks, recording the
/// first differing index on the token.
fn scan_mismatch<T, D>(token: &CancelToken, a: &[T], b: &[T], range: Range<usize>)
where
    T: PartialEq,
    D: LoopDriver<T>,
{
    let block = D::BLOCK.max(1);
    let mut start = range.start;
    while start < range.end {
        if token.was_cancelled_at(start) {
            return;
        }
        let end = (start + block).min(range.end);
        if let Some(offset) = D::mismatch(&a[start..end], &b[start..end]) {
            token.cancel(start + offset);
            return;
        }
        start = end;
    }
}

/// Returns true if `a` and `b` have the same length and all index-aligned
/// elements compare equal.
pub fn equal<'data, T, P>(policy: P, a: &'data [T], b: &'data [T]) -> P::Result<bool>
where
    T: PartialEq + Sync,
    P: ExecutionPolicy<'data>,
    P::Driver: LoopDriver<T>,
{
    policy.execute(move |partitioner| {
        if a.len() != b.len() {
            return false;
        }
        match partitioner {
            None => <P::Driver as LoopDriver<T>>::mismatch(a, b).is_none(),
            Some(mut partitioner) => {
                let token = CancelToken::new(a.len());
                partitioner.run(a.len(), |_, range| {
                    scan_mismatch::<T, P::Driver>(&token, a, b, range);
                });
                !token.was_cancelled()
            }
        }
    })
}

/// Returns the first index at which `a` and `b` differ, comparing over the
/// shorter length; returns `min(a.len(), b.len())` if no such index exists.
pub fn mismatch<'data, T, P>(policy: P, a: &'data [T], b: &'data [T]) -> P::Result<usize>
where
    T: PartialEq + Sync,
    P: ExecutionPolicy<'data>,
    P::Driver: LoopDriver<T>,
{
    policy.execute(move |partitioner| {
        let n = a.len().min(b.len());
        match partitioner {
            None => <P::Driver as LoopDriver<T>>::mismatch(&a[..n], &b[..n]).unwrap_or(n),
            Some(mut partitioner) => {
                let token = CancelToken::new(n);
                partitioner.run(n, |_, range| {
                    scan_mismatch::<T, P::Driver>(&token, a, b, range);
                });
                token.position()
            }
        }
    })
}

/// Returns the index of the leftmost element equal to `value`, if any.
pub fn find<'data, T, P>(policy: P, input: &'data [T], value: &'data T) -> P::Result<Option<usize>>
where
    T: PartialEq + Sync,
    P: ExecutionPolicy<'data>,
{
    find_if(policy, input, move |x| x == value)
}

/// Returns the index of the leftmost element satisfying `pred`, if any.
pub fn find_if<'data, T, P, F>(policy: P, input: &'data [T], pred: F) -> P::Result<Option<usize>>
where
    T: Sync,
    P: ExecutionPolicy<'data>,
    F: Fn(&T) -> bool + Send + Sync + 'data,
{
    policy.execute(move |partitioner| match partitioner {
        None => input.iter().position(|x| pred(x)),
        Some(mut partitioner) => {
            let token = CancelToken::new(input.len());
            partitioner.run(input.len(), |_, range| {
                let base = range.start;
                bounded_loop(&token, base, &input[range], |_, x| {
                    if pred(x) {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                });
            });
            token.was_cancelled().then(|| token.position())
        }
    })
}

/// Returns true if `a` is lexicographically less than `b`: decided by the
/// leftmost index-aligned pair that differs, or by length if one slice is a
/// prefix of the other.
///
/// ```
/// # use parstd::{lexicographical_compare, Seq};
/// assert!(lexicographical_compare(Seq, &[1, 2, 3], &[1, 2, 4]));
/// assert!(lexicographical_compare(Seq, &[1, 2], &[1, 2, 3]));
/// assert!(!lexicographical_compare(Seq, &[1, 2, 3], &[1, 2, 3]));
/// ```
pub fn lexicographical_compare<'data, T, P>(policy: P, a: &'data [T], b: &'data [T]) -> P::Result<bool>
where
    T: Ord + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| {
        let n = a.len().min(b.len());
        let decisive = match partitioner {
            None => a[..n].iter().zip(&b[..n]).position(|(x, y)| x != y),
            Some(mut partitioner) => {
                let token = CancelToken::new(n);
                partitioner.run(n, |_, range| {
                    let base = range.start;
                    bounded_loop(&token, base, &a[range], |i, x| {
                        if *x != b[i] {
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    });
                });
                token.was_cancelled().then(|| token.position())
            }
        };
        match decisive {
            // The first differing pair settles the order.
            Some(i) => a[i] < b[i],
            // Prefix rule: the shorter slice compares less.
            None => a.len() < b.len(),
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::pool::{CpuPinningPolicy, ThreadCount, ThreadPoolBuilder};
    use crate::policy::{Par, ParUnseq, Seq, Unseq};
    use crate::ThreadPool;

    fn pool(workers: usize) -> ThreadPool {
        ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(workers).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build()
    }

    #[test]
    fn equal_detects_equality_and_length() {
        let a: Vec<u32> = (0..997).collect();
        let mut b = a.clone();
        let mut pool = pool(4);

        assert!(equal(Seq, &a, &b));
        assert!(equal(Unseq, &a, &b));
        assert!(equal(Par::new(&mut pool), &a, &b));
        assert!(equal(ParUnseq::new(&mut pool), &a, &b));

        b[500] = 0;
        assert!(!equal(Seq, &a, &b));
        assert!(!equal(ParUnseq::new(&mut pool), &a, &b));

        assert!(!equal(Seq, &a, &a[..996]));
        assert!(!equal(Par::new(&mut pool), &a, &a[..996]));
    }

    #[test]
    fn mismatch_reports_the_leftmost_difference() {
        let a: Vec<u64> = (0..1000).collect();
        let mut b = a.clone();
        b[237] += 1;
        b[801] += 1;
        let mut pool = pool(4);

        assert_eq!(mismatch(Seq, &a, &b), 237);
        assert_eq!(mismatch(Unseq, &a, &b), 237);
        assert_eq!(mismatch(Par::new(&mut pool), &a, &b), 237);
        assert_eq!(mismatch(ParUnseq::new(&mut pool), &a, &b), 237);
    }

    #[test]
    fn mismatch_of_a_prefix_is_the_shorter_length() {
        let a = [1, 2, 3, 4];
        let mut pool = pool(2);
        assert_eq!(mismatch(Seq, &a, &a[..2]), 2);
        assert_eq!(mismatch(Par::new(&mut pool), &a[..2], &a), 2);
        assert_eq!(mismatch(Seq, &a, &a), 4);
    }

    #[test]
    fn find_returns_the_leftmost_occurrence() {
        let mut input = vec![0u32; 1000];
        input[321] = 7;
        input[322] = 7;
        input[900] = 7;
        let mut pool = pool(4);

        assert_eq!(find(Seq, &input, &7), Some(321));
        assert_eq!(find(Par::new(&mut pool), &input, &7), Some(321));
        assert_eq!(find(Seq, &input, &9), None);
        assert_eq!(find(Par::new(&mut pool), &input, &9), None);
    }

    #[test]
    fn find_if_matches_position() {
        let input: Vec<i32> = (0..500).map(|x| x - 250).collect();
        let mut pool = pool(4);
        assert_eq!(find_if(Seq, &input, |x| *x >= 0), Some(250));
        assert_eq!(find_if(Par::new(&mut pool), &input, |x| *x >= 0), Some(250));
    }

    #[test]
    fn lexicographical_compare_follows_the_decisive_pair() {
        let mut pool = pool(4);
        assert!(lexicographical_compare(Seq, &[1, 2, 3], &[1, 2, 4]));
        assert!(lexicographical_compare(Par::new(&mut pool), &[1, 2, 3], &[1, 2, 4]));
        assert!(!lexicographical_compare(Seq, &[1, 2, 4], &[1, 2, 3]));
        assert!(!lexicographical_compare(Par::new(&mut pool), &[1, 2, 4], &[1, 2, 3]));
    }

    #[test]
    fn lexicographical_compare_prefix_rule() {
        let mut pool = pool(4);
        assert!(lexicographical_compare(Seq, &[1, 2], &[1, 2, 3]));
        assert!(lexicographical_compare(Par::new(&mut pool), &[1, 2], &[1, 2, 3]));
        assert!(!lexicographical_compare(Seq, &[1, 2, 3], &[1, 2, 3]));
        assert!(!lexicographical_compare(Seq, &[1, 2, 3], &[1, 2]));
        let empty: [i32; 0] = [];
        assert!(lexicographical_compare(Seq, &empty, &[0]));
        assert!(!lexicographical_compare(Seq, &[0], &empty));
        assert!(!lexicographical_compare(Par::new(&mut pool), &empty, &empty));
    }

    // The token must always settle on the leftmost hit, however the chunks
    // were scheduled.
    #[test]
    fn parallel_scans_are_leftmost_deterministic() {
        let mut pool = pool(8);
        let mut input = vec![0u8; 10_000];
        for i in (100..10_000).step_by(700) {
            input[i] = 1;
        }
        for _ in 0..50 {
            assert_eq!(find(Par::new(&mut pool), &input, &1), Some(100));
        }
    }
}
