// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Counting algorithms.

use crate::core::pack::LoopDriver;
use crate::policy::ExecutionPolicy;

/// Returns the number of elements of `input` equal to `value`.
///
/// ```
/// # use parstd::{count, Seq};
/// assert_eq!(count(Seq, &[1, 2, 2, 3, 2], &2), 3);
/// ```
pub fn count<'data, T, P>(policy: P, input: &'data [T], value: &'data T) -> P::Result<usize>
where
    T: PartialEq + Sync,
    P: ExecutionPolicy<'data>,
    P::Driver: LoopDriver<T>,
{
    policy.execute(move |partitioner| match partitioner {
        None => <P::Driver as LoopDriver<T>>::count_eq(input, value),
        Some(mut partitioner) => partitioner
            .run(input.len(), |_, range| {
                <P::Driver as LoopDriver<T>>::count_eq(&input[range], value)
            })
            .into_iter()
            .sum(),
    })
}

/// Returns the number of elements of `input` satisfying `pred`.
pub fn count_if<'data, T, P, F>(policy: P, input: &'data [T], pred: F) -> P::Result<usize>
where
    T: Sync,
    P: ExecutionPolicy<'data>,
    F: Fn(&T) -> bool + Send + Sync + 'data,
{
    policy.execute(move |partitioner| match partitioner {
        None => input.iter().filter(|x| pred(x)).count(),
        Some(mut partitioner) => partitioner
            .run(input.len(), |_, range| {
                input[range].iter().filter(|x| pred(x)).count()
            })
            .into_iter()
            .sum(),
    })
}
