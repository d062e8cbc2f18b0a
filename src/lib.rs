// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod algo;
mod core;
pub mod ext;
mod macros;
mod policy;

pub use crate::algo::compare::{equal, find, find_if, lexicographical_compare, mismatch};
pub use crate::algo::copy::{
    copy, copy_if, copy_n, swap_ranges, uninitialized_copy, uninitialized_copy_n,
};
pub use crate::algo::count::{count, count_if};
pub use crate::algo::heap::{is_heap, is_heap_until};
pub use crate::algo::reduce_by_key::reduce_by_key;
pub use crate::algo::reorder::{reverse, reverse_copy, rotate, rotate_copy};
pub use crate::algo::sort::{partial_sort_copy, stable_sort};
pub use crate::core::cancel::CancelToken;
pub use crate::core::pack::{LoopDriver, Pack, PackedDriver, ScalarDriver};
pub use crate::core::partition::{ChunkParams, PanicBundle, Partitioner};
pub use crate::core::pool::{CpuPinningPolicy, ThreadCount, ThreadPool, ThreadPoolBuilder};
pub use crate::ext::{SliceExt, SliceMutExt};
pub use crate::policy::{ExecutionPolicy, Job, Par, ParTask, ParUnseq, ParUnseqTask, Seq, Unseq};

#[cfg(test)]
mod test {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use std::mem::MaybeUninit;

    #[derive(Clone, Copy, Debug)]
    enum Mode {
        Seq,
        Unseq,
        Par,
        ParUnseq,
        ParTask,
        ParUnseqTask,
    }

    fn test_pool() -> ThreadPool {
        let _ = env_logger::builder().is_test(true).try_init();
        ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(4).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
        }
        .build()
    }

    /// Evaluates `$call` with `$policy` bound to the policy selected by
    /// `$mode`, unwrapping deferred results so every arm yields the plain
    /// value.
    macro_rules! dispatch {
        ( $mode:expr, $policy:ident => $call:expr ) => {
            match $mode {
                Mode::Seq => {
                    let $policy = Seq;
                    $call
                }
                Mode::Unseq => {
                    let $policy = Unseq;
                    $call
                }
                Mode::Par => {
                    let mut pool = test_pool();
                    let $policy = Par::new(&mut pool);
                    $call
                }
                Mode::ParUnseq => {
                    let mut pool = test_pool();
                    let $policy = ParUnseq::new(&mut pool);
                    $call
                }
                Mode::ParTask => {
                    let mut pool = test_pool();
                    std::thread::scope(|scope| {
                        let $policy = ParTask::new(scope, &mut pool);
                        $call.join()
                    })
                }
                Mode::ParUnseqTask => {
                    let mut pool = test_pool();
                    std::thread::scope(|scope| {
                        let $policy = ParUnseqTask::new(scope, &mut pool);
                        $call.join()
                    })
                }
            }
        };
    }

    macro_rules! expand_tests {
        ( $mode:expr, ) => {};
        ( $mode:expr, $case:ident, $( $others:tt )* ) => {
            #[test]
            fn $case() {
                $crate::test::$case($mode);
            }

            expand_tests!($mode, $($others)*);
        };
        ( $mode:expr, $case:ident => fail($msg:expr), $( $others:tt )* ) => {
            #[test]
            #[should_panic(expected = $msg)]
            fn $case() {
                $crate::test::$case($mode);
            }

            expand_tests!($mode, $($others)*);
        };
    }

    macro_rules! policy_tests {
        ( $mod:ident, $mode:expr, $( $tests:tt )* ) => {
            mod $mod {
                use super::*;

                expand_tests!($mode, $($tests)*);
            }
        };
    }

    macro_rules! all_policy_tests {
        ( $mod:ident, $mode:expr ) => {
            policy_tests!(
                $mod,
                $mode,
                case_count,
                case_count_if,
                case_equal,
                case_mismatch,
                case_find,
                case_find_if,
                case_lexicographical_compare,
                case_copy,
                case_copy_n,
                case_copy_if,
                case_swap_ranges,
                case_uninitialized_copy,
                case_reverse,
                case_reverse_copy,
                case_rotate,
                case_rotate_copy,
                case_is_heap,
                case_is_heap_until,
                case_stable_sort,
                case_partial_sort_copy,
                case_reduce_by_key,
                case_worker_panic_surfaces,
                case_randomized_matches_seq,
                case_rotate_out_of_range => fail("out of bounds"),
            );
        };
    }

    all_policy_tests!(seq, Mode::Seq);
    all_policy_tests!(unseq, Mode::Unseq);
    all_policy_tests!(par, Mode::Par);
    all_policy_tests!(par_unseq, Mode::ParUnseq);
    all_policy_tests!(par_task, Mode::ParTask);
    all_policy_tests!(par_unseq_task, Mode::ParUnseqTask);

    fn case_count(mode: Mode) {
        let input: Vec<u64> = (0..10_000).map(|i| i % 5).collect();
        let total = dispatch!(mode, policy => count(policy, &input, &3));
        assert_eq!(total, 2_000);
    }

    fn case_count_if(mode: Mode) {
        let input: Vec<u64> = (0..10_000).collect();
        let total = dispatch!(mode, policy => count_if(policy, &input, |x| x % 7 == 0));
        assert_eq!(total, input.iter().filter(|x| **x % 7 == 0).count());
    }

    fn case_equal(mode: Mode) {
        let a: Vec<u32> = (0..4099).collect();
        let b = a.clone();
        assert!(dispatch!(mode, policy => equal(policy, &a, &b)));

        let mut c = a.clone();
        c[4098] = 0;
        assert!(!dispatch!(mode, policy => equal(policy, &a, &c)));
        assert!(!dispatch!(mode, policy => equal(policy, &a, &b[..4098])));
    }

    fn case_mismatch(mode: Mode) {
        let a: Vec<u32> = (0..4099).collect();
        let mut b = a.clone();
        b[1234] = 0;
        assert_eq!(dispatch!(mode, policy => mismatch(policy, &a, &b)), 1234);
        assert_eq!(dispatch!(mode, policy => mismatch(policy, &a, &a)), 4099);
    }

    fn case_find(mode: Mode) {
        let mut input = vec![0u32; 4099];
        input[777] = 1;
        input[3000] = 1;
        assert_eq!(dispatch!(mode, policy => find(policy, &input, &1)), Some(777));
        assert_eq!(dispatch!(mode, policy => find(policy, &input, &2)), None);
    }

    fn case_find_if(mode: Mode) {
        let input: Vec<i32> = (-2000..2000).collect();
        let found = dispatch!(mode, policy => find_if(policy, &input, |x| *x * *x == 81));
        assert_eq!(found, Some(1991));
    }

    fn case_lexicographical_compare(mode: Mode) {
        let a: Vec<u8> = vec![1; 5000];
        let mut b = a.clone();
        b[4999] = 2;
        assert!(dispatch!(mode, policy => lexicographical_compare(policy, &a, &b)));
        assert!(!dispatch!(mode, policy => lexicographical_compare(policy, &b, &a)));
        assert!(dispatch!(mode, policy => lexicographical_compare(policy, &a[..100], &a)));
        assert!(!dispatch!(mode, policy => lexicographical_compare(policy, &a, &a)));
    }

    fn case_copy(mode: Mode) {
        let src: Vec<u64> = (0..4099).collect();
        let mut dst = vec![0; 4099];
        assert_eq!(dispatch!(mode, policy => copy(policy, &src, &mut dst)), 4099);
        assert_eq!(dst, src);
    }

    fn case_copy_n(mode: Mode) {
        let src: Vec<u64> = (0..1000).collect();
        let mut dst = vec![0; 1000];
        assert_eq!(dispatch!(mode, policy => copy_n(policy, &src, 600, &mut dst)), 600);
        assert_eq!(dst[..600], src[..600]);
        assert!(dst[600..].iter().all(|x| *x == 0));
        assert_eq!(dispatch!(mode, policy => copy_n(policy, &src, 0, &mut dst)), 0);
    }

    fn case_copy_if(mode: Mode) {
        let src: Vec<i64> = (0..4099).collect();
        let expected: Vec<i64> = src.iter().copied().filter(|x| x % 3 == 0).collect();
        let mut dst = vec![0; 4099];
        let written = dispatch!(mode, policy => copy_if(policy, &src, &mut dst, |x| x % 3 == 0));
        assert_eq!(dst[..written], expected);
    }

    fn case_swap_ranges(mode: Mode) {
        let mut a: Vec<u32> = (0..3000).collect();
        let mut b: Vec<u32> = (3000..6000).collect();
        let swapped = dispatch!(mode, policy => swap_ranges(policy, &mut a, &mut b));
        assert_eq!(swapped, 3000);
        assert_eq!(a, (3000..6000).collect::<Vec<u32>>());
        assert_eq!(b, (0..3000).collect::<Vec<u32>>());
    }

    fn case_uninitialized_copy(mode: Mode) {
        let src: Vec<String> = (0..500).map(|i| format!("item-{i}")).collect();
        let mut dst: Vec<MaybeUninit<String>> = (0..500).map(|_| MaybeUninit::uninit()).collect();
        let n = dispatch!(mode, policy => uninitialized_copy(policy, &src, &mut dst));
        assert_eq!(n, 500);
        for (slot, expected) in dst.iter_mut().zip(&src) {
            assert_eq!(&unsafe { slot.assume_init_read() }, expected);
        }
    }

    fn case_reverse(mode: Mode) {
        let mut data: Vec<u32> = (0..4099).collect();
        dispatch!(mode, policy => reverse(policy, &mut data));
        assert_eq!(data, (0..4099).rev().collect::<Vec<u32>>());
    }

    fn case_reverse_copy(mode: Mode) {
        let src: Vec<u32> = (0..4099).collect();
        let mut dst = vec![0; 4099];
        assert_eq!(dispatch!(mode, policy => reverse_copy(policy, &src, &mut dst)), 4099);
        assert_eq!(dst, (0..4099).rev().collect::<Vec<u32>>());
    }

    fn case_rotate(mode: Mode) {
        let mut data: Vec<u32> = (0..4099).collect();
        let mut expected = data.clone();
        expected.rotate_left(1500);
        dispatch!(mode, policy => rotate(policy, &mut data, 1500));
        assert_eq!(data, expected);
    }

    fn case_rotate_copy(mode: Mode) {
        let src: Vec<u32> = (0..4099).collect();
        let mut expected = src.clone();
        expected.rotate_left(1500);
        let mut dst = vec![0; 4099];
        assert_eq!(dispatch!(mode, policy => rotate_copy(policy, &src, 1500, &mut dst)), 4099);
        assert_eq!(dst, expected);
    }

    fn case_rotate_out_of_range(mode: Mode) {
        let mut data = [1, 2, 3];
        dispatch!(mode, policy => rotate(policy, &mut data, 4));
    }

    fn case_is_heap(mode: Mode) {
        let heap: Vec<u32> = std::collections::BinaryHeap::from_iter(0..4099).into_vec();
        assert!(dispatch!(mode, policy => is_heap(policy, &heap)));
        let mut broken = heap.clone();
        let last = broken.len() - 1;
        broken[last] = u32::MAX;
        assert!(!dispatch!(mode, policy => is_heap(policy, &broken)));
    }

    fn case_is_heap_until(mode: Mode) {
        let mut data: Vec<i32> = (0..4099).rev().collect();
        assert_eq!(dispatch!(mode, policy => is_heap_until(policy, &data)), 4099);
        data[2000] = i32::MAX;
        assert_eq!(dispatch!(mode, policy => is_heap_until(policy, &data)), 2000);
    }

    fn case_stable_sort(mode: Mode) {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut data: Vec<(u8, u32)> = (0..4099).map(|i| (rng.random_range(0..8), i)).collect();
        let mut expected = data.clone();
        expected.sort();
        dispatch!(mode, policy => stable_sort(policy, &mut data));
        assert_eq!(data, expected);
    }

    fn case_partial_sort_copy(mode: Mode) {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let src: Vec<i64> = (0..4099).map(|_| rng.random_range(-1000..1000)).collect();
        let mut expected = src.clone();
        expected.sort();
        let mut dst = vec![0; 64];
        assert_eq!(dispatch!(mode, policy => partial_sort_copy(policy, &src, &mut dst)), 64);
        assert_eq!(dst, expected[..64]);
    }

    fn case_reduce_by_key(mode: Mode) {
        let keys = [1, 1, 2, 2, 2, 3];
        let values = [10, 20, 30, 40, 50, 5];
        let (k, v) = dispatch!(mode, policy => reduce_by_key(policy, &keys, &values, |a, b| a + b));
        assert_eq!(k, [1, 2, 3]);
        assert_eq!(v, [30, 120, 5]);
    }

    // A panic in a predicate reaches the caller whatever the policy; the
    // payload is the raw panic for inline policies and a bundle when it
    // happened inside pool workers.
    fn case_worker_panic_surfaces(mode: Mode) {
        let input: Vec<u64> = (0..1000).collect();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatch!(mode, policy => count_if(policy, &input, |x| {
                if *x == 500 {
                    panic!("predicate blew up");
                }
                true
            }))
        }));
        let payload = outcome.unwrap_err();
        match mode {
            Mode::Seq | Mode::Unseq => {
                assert_eq!(
                    payload.downcast_ref::<&'static str>().copied(),
                    Some("predicate blew up")
                );
            }
            _ => {
                let bundle = payload.downcast_ref::<PanicBundle>().unwrap();
                assert_eq!(bundle.len(), 1);
                assert_eq!(
                    bundle.payloads().next().unwrap().downcast_ref::<&'static str>(),
                    Some(&"predicate blew up")
                );
            }
        }
    }

    fn case_randomized_matches_seq(mode: Mode) {
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        for _ in 0..5 {
            let len = rng.random_range(0..3000);
            let data: Vec<u32> = (0..len).map(|_| rng.random_range(0..50)).collect();
            let needle = rng.random_range(0..50);

            let expected_count = count(Seq, &data, &needle);
            assert_eq!(dispatch!(mode, policy => count(policy, &data, &needle)), expected_count);

            let expected_find = find(Seq, &data, &needle);
            assert_eq!(dispatch!(mode, policy => find(policy, &data, &needle)), expected_find);

            let expected_until = is_heap_until(Seq, &data);
            assert_eq!(
                dispatch!(mode, policy => is_heap_until(policy, &data)),
                expected_until
            );

            let mut expected_sorted = data.clone();
            expected_sorted.sort();
            let mut sorted = data.clone();
            dispatch!(mode, policy => stable_sort(policy, &mut sorted));
            assert_eq!(sorted, expected_sorted);
        }
    }
}
