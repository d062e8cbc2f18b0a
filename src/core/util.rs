// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Small synchronization helpers shared by the job board and the pool.

use std::ops::Range;
use std::ptr::NonNull;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A [`Mutex`]-[`Condvar`] pair holding a single state value.
pub struct Signal<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
}

impl<T> Signal<T> {
    /// Creates a new signal initialized with the given state.
    pub fn new(t: T) -> Self {
        Self {
            mutex: Mutex::new(t),
            condvar: Condvar::new(),
        }
    }

    /// Attempts to set the state and wake one waiting thread.
    ///
    /// Fails if the [`Mutex`] is poisoned.
    pub fn try_notify_one(&self, t: T) -> Result<(), PoisonError<MutexGuard<'_, T>>> {
        *self.mutex.lock()? = t;
        self.condvar.notify_one();
        Ok(())
    }

    /// Sets the state and wakes all waiting threads.
    pub fn notify_all(&self, t: T) {
        *self.mutex.lock().unwrap() = t;
        self.condvar.notify_all();
    }

    /// Blocks until the predicate turns false, returning the guard for
    /// further inspection or modification.
    pub fn wait_while(&self, predicate: impl FnMut(&mut T) -> bool) -> MutexGuard<T> {
        self.condvar
            .wait_while(self.mutex.lock().unwrap(), predicate)
            .unwrap()
    }
}

/// Proxy trait for types carrying a lifetime parameter.
///
/// Rust has no higher-kinded types, so a generic associated type stands in
/// for "the same type at any lifetime". The job board uses this to erase the
/// lifetime of a borrowed task object while it is visible to the workers.
pub trait WithLifetime {
    type T<'a>: ?Sized;
}

/// A lifetime-erased reference to a `T::T<'_>`.
///
/// Acts as a `&'a T::T<'a>` whose lifetime is re-attached by the `unsafe`
/// [`get()`](Self::get) call.
pub struct ErasedRef<T: WithLifetime> {
    ptr: Option<NonNull<T::T<'static>>>,
}

impl<T: WithLifetime> ErasedRef<T> {
    /// Creates an empty reference.
    pub fn empty() -> Self {
        Self { ptr: None }
    }

    /// Points this at the given reference. Callers of [`get()`](Self::get)
    /// must not outlive the reference stored here.
    // The cast coerces the lifetime to 'static.
    #[allow(clippy::unnecessary_cast)]
    pub fn set(&mut self, value: &T::T<'_>) {
        self.ptr = NonNull::new(NonNull::from(value).as_ptr() as *mut T::T<'static>);
    }

    /// Clears the stored reference; [`get()`](Self::get) returns [`None`]
    /// afterwards.
    pub fn clear(&mut self) {
        self.ptr = None;
    }

    /// Returns the reference previously stored by [`set()`](Self::set).
    ///
    /// # Safety
    ///
    /// The underlying object must be live and not mutated for the whole
    /// output lifetime.
    // The cast re-attaches the caller's lifetime.
    #[allow(clippy::unnecessary_cast)]
    pub unsafe fn get<'a>(&self) -> Option<&'a T::T<'a>> {
        self.ptr.map(|static_ptr| {
            let ptr = static_ptr.as_ptr() as *mut T::T<'a>;
            // SAFETY:
            // - The pointer was set from a valid reference in `set()`.
            // - The caller guarantees the referent is live and unmutated for
            //   the output lifetime.
            unsafe { &*ptr }
        })
    }
}

/// SAFETY: An [`ErasedRef`] acts as a `&'a T::T<'a>`, so it is [`Send`] iff
/// `T::T<'_>` is [`Sync`].
unsafe impl<T: WithLifetime> Send for ErasedRef<T> where for<'a> T::T<'a>: Sync {}
/// SAFETY: Same argument as for [`Send`].
unsafe impl<T: WithLifetime> Sync for ErasedRef<T> where for<'a> T::T<'a>: Sync {}

/// An unchecked view of a mutable slice that several workers may write
/// through at once, as long as each index is touched by at most one worker.
///
/// In-place algorithms hand each partition a disjoint sub-range of the same
/// output slice; the borrow checker cannot see the disjointness, this type
/// carries it as an invariant instead.
pub struct RawSlice<T> {
    ptr: *mut T,
    len: usize,
}

impl<T> RawSlice<T> {
    pub fn new(slice: &mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// Reborrows a sub-range of the underlying slice.
    ///
    /// # Safety
    ///
    /// No other live borrow (through this view or elsewhere) may overlap
    /// `range` for the duration of the output borrow.
    pub unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [T] {
        debug_assert!(range.start <= range.end && range.end <= self.len);
        // SAFETY: in bounds of the original slice, and the caller guarantees
        // exclusivity over `range`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.len()) }
    }

    /// Shared counterpart of [`slice_mut()`](Self::slice_mut).
    ///
    /// # Safety
    ///
    /// No mutable borrow may overlap `range` for the duration of the output
    /// borrow; overlapping shared borrows are fine.
    pub unsafe fn slice_ref(&self, range: Range<usize>) -> &[T] {
        debug_assert!(range.start <= range.end && range.end <= self.len);
        // SAFETY: in bounds, and the caller rules out concurrent writers.
        unsafe { std::slice::from_raw_parts(self.ptr.add(range.start), range.len()) }
    }
}

/// SAFETY: A [`RawSlice`] is a distributed `&mut [T]`; moving or sharing it
/// across threads moves access to the elements, so `T: Send` suffices.
unsafe impl<T: Send> Send for RawSlice<T> {}
/// SAFETY: Same argument as for [`Send`]; concurrent `slice_mut` calls are
/// constrained to disjoint ranges by that method's contract.
unsafe impl<T: Send> Sync for RawSlice<T> {}
