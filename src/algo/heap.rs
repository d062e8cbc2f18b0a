// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Binary max-heap property checks.

use crate::core::cancel::CancelToken;
use crate::core::loops::bounded_loop;
use crate::core::partition::Partitioner;
use crate::policy::ExecutionPolicy;
use std::ops::ControlFlow;

/// An index violates the heap property when its parent compares less.
fn violates<T: Ord>(run: &[T], i: usize) -> bool {
    i > 0 && run[(i - 1) / 2] < run[i]
}

fn heap_until_body<T: Ord + Sync>(partitioner: Option<Partitioner<'_>>, run: &[T]) -> usize {
    match partitioner {
        None => (0..run.len())
            .find(|i| violates(run, *i))
            .unwrap_or(run.len()),
        Some(mut partitioner) => {
            let token = CancelToken::new(run.len());
            partitioner.run(run.len(), |_, range| {
                let base = range.start;
                bounded_loop(&token, base, &run[range], |i, _| {
                    if violates(run, i) {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                });
            });
            token.position()
        }
    }
}

/// Returns the length of the longest prefix of `run` that is a binary max
/// heap: the first index whose parent compares less, or `run.len()` if the
/// whole slice heaps. Empty and singleton slices heap vacuously.
pub fn is_heap_until<'data, T, P>(policy: P, run: &'data [T]) -> P::Result<usize>
where
    T: Ord + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| heap_until_body(partitioner, run))
}

/// Returns true if the whole of `run` is a binary max heap.
pub fn is_heap<'data, T, P>(policy: P, run: &'data [T]) -> P::Result<bool>
where
    T: Ord + Sync,
    P: ExecutionPolicy<'data>,
{
    policy.execute(move |partitioner| heap_until_body(partitioner, run) == run.len())
}
