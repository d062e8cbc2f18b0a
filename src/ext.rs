// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Method-syntax adaptors over the free-function algorithms, for call
//! sites that read better as `data.par_find(policy, &x)` than as
//! `find(policy, &data, &x)`. Algorithms taking a separate destination keep
//! their free-function form.

use crate::algo;
use crate::core::pack::LoopDriver;
use crate::policy::ExecutionPolicy;

/// Policy-driven algorithms on shared slices.
pub trait SliceExt<T> {
    /// See [`count()`](algo::count::count).
    fn par_count<'data, P>(&'data self, policy: P, value: &'data T) -> P::Result<usize>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
        P::Driver: LoopDriver<T>;

    /// See [`count_if()`](algo::count::count_if).
    fn par_count_if<'data, P, F>(&'data self, policy: P, pred: F) -> P::Result<usize>
    where
        T: Sync,
        P: ExecutionPolicy<'data>,
        F: Fn(&T) -> bool + Send + Sync + 'data;

    /// See [`equal()`](algo::compare::equal).
    fn par_equal<'data, P>(&'data self, policy: P, other: &'data [T]) -> P::Result<bool>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
        P::Driver: LoopDriver<T>;

    /// See [`mismatch()`](algo::compare::mismatch).
    fn par_mismatch<'data, P>(&'data self, policy: P, other: &'data [T]) -> P::Result<usize>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
        P::Driver: LoopDriver<T>;

    /// See [`find()`](algo::compare::find).
    fn par_find<'data, P>(&'data self, policy: P, value: &'data T) -> P::Result<Option<usize>>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>;

    /// See [`find_if()`](algo::compare::find_if).
    fn par_find_if<'data, P, F>(&'data self, policy: P, pred: F) -> P::Result<Option<usize>>
    where
        T: Sync,
        P: ExecutionPolicy<'data>,
        F: Fn(&T) -> bool + Send + Sync + 'data;

    /// See [`lexicographical_compare()`](algo::compare::lexicographical_compare).
    fn par_lt<'data, P>(&'data self, policy: P, other: &'data [T]) -> P::Result<bool>
    where
        T: Ord + Sync,
        P: ExecutionPolicy<'data>;

    /// See [`is_heap()`](algo::heap::is_heap).
    fn par_is_heap<'data, P>(&'data self, policy: P) -> P::Result<bool>
    where
        T: Ord + Sync,
        P: ExecutionPolicy<'data>;

    /// See [`is_heap_until()`](algo::heap::is_heap_until).
    fn par_is_heap_until<'data, P>(&'data self, policy: P) -> P::Result<usize>
    where
        T: Ord + Sync,
        P: ExecutionPolicy<'data>;
}

impl<T> SliceExt<T> for [T] {
    fn par_count<'data, P>(&'data self, policy: P, value: &'data T) -> P::Result<usize>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
        P::Driver: LoopDriver<T>,
    {
        algo::count::count(policy, self, value)
    }

    fn par_count_if<'data, P, F>(&'data self, policy: P, pred: F) -> P::Result<usize>
    where
        T: Sync,
        P: ExecutionPolicy<'data>,
        F: Fn(&T) -> bool + Send + Sync + 'data,
    {
        algo::count::count_if(policy, self, pred)
    }

    fn par_equal<'data, P>(&'data self, policy: P, other: &'data [T]) -> P::Result<bool>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
        P::Driver: LoopDriver<T>,
    {
        algo::compare::equal(policy, self, other)
    }

    fn par_mismatch<'data, P>(&'data self, policy: P, other: &'data [T]) -> P::Result<usize>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
        P::Driver: LoopDriver<T>,
    {
        algo::compare::mismatch(policy, self, other)
    }

    fn par_find<'data, P>(&'data self, policy: P, value: &'data T) -> P::Result<Option<usize>>
    where
        T: PartialEq + Sync,
        P: ExecutionPolicy<'data>,
    {
        algo::compare::find(policy, self, value)
    }

    fn par_find_if<'data, P, F>(&'data self, policy: P, pred: F) -> P::Result<Option<usize>>
    where
        T: Sync,
        P: ExecutionPolicy<'data>,
        F: Fn(&T) -> bool + Send + Sync + 'data,
    {
        algo::compare::find_if(policy, self, pred)
    }

    fn par_lt<'data, P>(&'data self, policy: P, other: &'data [T]) -> P::Result<bool>
    where
        T: Ord + Sync,
        P: ExecutionPolicy<'data>,
    {
        algo::compare::lexicographical_compare(policy, self, other)
    }

    fn par_is_heap<'data, P>(&'data self, policy: P) -> P::Result<bool>
    where
        T: Ord + Sync,
        P: ExecutionPolicy<'data>,
    {
        algo::heap::is_heap(policy, self)
    }

    fn par_is_heap_until<'data, P>(&'data self, policy: P) -> P::Result<usize>
    where
        T: Ord + Sync,
        P: ExecutionPolicy<'data>,
    {
        algo::heap::is_heap_until(policy, self)
    }
}

/// Policy-driven algorithms on mutable slices.
pub trait SliceMutExt<T> {
    /// See [`reverse()`](algo::reorder::reverse).
    fn par_reverse<'data, P>(&'data mut self, policy: P) -> P::Result<()>
    where
        T: Send,
        P: ExecutionPolicy<'data>;

    /// See [`rotate()`](algo::reorder::rotate).
    fn par_rotate<'data, P>(&'data mut self, policy: P, mid: usize) -> P::Result<()>
    where
        T: Send,
        P: ExecutionPolicy<'data>;

    /// See [`stable_sort()`](algo::sort::stable_sort).
    fn par_stable_sort<'data, P>(&'data mut self, policy: P) -> P::Result<()>
    where
        T: Ord + Clone + Send + Sync,
        P: ExecutionPolicy<'data>;

    /// See [`swap_ranges()`](algo::copy::swap_ranges).
    fn par_swap_ranges<'data, P>(&'data mut self, policy: P, other: &'data mut [T]) -> P::Result<usize>
    where
        T: Send,
        P: ExecutionPolicy<'data>;
}

impl<T> SliceMutExt<T> for [T] {
    fn par_reverse<'data, P>(&'data mut self, policy: P) -> P::Result<()>
    where
        T: Send,
        P: ExecutionPolicy<'data>,
    {
        algo::reorder::reverse(policy, self)
    }

    fn par_rotate<'data, P>(&'data mut self, policy: P, mid: usize) -> P::Result<()>
    where
        T: Send,
        P: ExecutionPolicy<'data>,
    {
        algo::reorder::rotate(policy, self, mid)
    }

    fn par_stable_sort<'data, P>(&'data mut self, policy: P) -> P::Result<()>
    where
        T: Ord + Clone + Send + Sync,
        P: ExecutionPolicy<'data>,
    {
        algo::sort::stable_sort(policy, self)
    }

    fn par_swap_ranges<'data, P>(&'data mut self, policy: P, other: &'data mut [T]) -> P::Result<usize>
    where
        T: Send,
        P: ExecutionPolicy<'data>,
    {
        algo::copy::swap_ranges(policy, self, other)
    }
}
