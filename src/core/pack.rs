// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Vectorized loop layer: the pack contract and the loop drivers selected by
//! execution policies.
//!
//! A "pack" is one hardware-vector-width group of elements. The kernels here
//! are written as fixed-lane straight-line loops over [`chunks_exact`]
//! blocks, which the compiler turns into vector code; no unstable SIMD APIs
//! are involved. Types without a packed kernel can still implement [`Pack`]
//! with the defaults (`LANES = 1`), which run the scalar bodies; the
//! fallback is total and never skips or double-applies an element.
//!
//! [`chunks_exact`]: slice::chunks_exact

/// The vector-pack contract.
///
/// `LANES` is the number of elements one vector step consumes. Each kernel
/// must behave exactly like its scalar default; the packed overrides only
/// change how the work is blocked.
pub trait Pack: Copy + PartialEq + Send + Sync {
    /// Elements per vector step; 1 means scalar processing.
    const LANES: usize = 1;

    /// Counts the elements of `run` equal to `needle`.
    fn count_eq(run: &[Self], needle: &Self) -> usize {
        run.iter().filter(|x| *x == needle).count()
    }

    /// Returns the first index at which `a` and `b` differ.
    ///
    /// Both runs must have the same length.
    fn mismatch(a: &[Self], b: &[Self]) -> Option<usize> {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).position(|(x, y)| x != y)
    }
}

/// Applies a step across a run, a pack at a time where possible.
///
/// Unaligned head elements are processed one by one until the cursor reaches
/// a vector-width boundary, the aligned body is handed to `pack_step` in
/// `T::LANES`-sized blocks, and the tail is processed one by one again.
/// Every element is visited exactly once, in order; both steps receive the
/// starting index of what they are given.
pub fn vec_loop<T: Pack>(
    run: &[T],
    mut scalar_step: impl FnMut(usize, &T),
    mut pack_step: impl FnMut(usize, &[T]),
) {
    if T::LANES <= 1 || run.len() < T::LANES {
        for (i, x) in run.iter().enumerate() {
            scalar_step(i, x);
        }
        return;
    }

    let vector_bytes = T::LANES * std::mem::size_of::<T>();
    // `align_offset` returns `usize::MAX` when the alignment can't be
    // reached; the `min` falls back to an all-scalar pass in that case.
    let head = run.as_ptr().align_offset(vector_bytes).min(run.len());
    for (i, x) in run[..head].iter().enumerate() {
        scalar_step(i, x);
    }

    let mut index = head;
    let mut chunks = run[head..].chunks_exact(T::LANES);
    for chunk in &mut chunks {
        pack_step(index, chunk);
        index += T::LANES;
    }
    for x in chunks.remainder() {
        scalar_step(index, x);
        index += 1;
    }
}

macro_rules! packed_impl {
    ( $( $ty:ty => $lanes:expr, )* ) => {
        $(
            impl Pack for $ty {
                const LANES: usize = $lanes;

                fn count_eq(run: &[Self], needle: &Self) -> usize {
                    let needle = *needle;
                    // A `Cell` lets both loop bodies update the total.
                    let total = std::cell::Cell::new(0usize);
                    vec_loop(
                        run,
                        |_, x| total.set(total.get() + (*x == needle) as usize),
                        |_, chunk| {
                            // Independent per-lane accumulators.
                            let mut acc = [0usize; $lanes];
                            for (a, x) in acc.iter_mut().zip(chunk) {
                                *a += (*x == needle) as usize;
                            }
                            total.set(total.get() + acc.iter().sum::<usize>());
                        },
                    );
                    total.get()
                }

                fn mismatch(a: &[Self], b: &[Self]) -> Option<usize> {
                    debug_assert_eq!(a.len(), b.len());
                    let mut i = 0;
                    // Pairwise loads can't both be aligned in general, so
                    // the whole body runs unaligned pack-sized blocks.
                    while i + $lanes <= a.len() {
                        let (ca, cb) = (&a[i..i + $lanes], &b[i..i + $lanes]);
                        let mut all_eq = true;
                        for (x, y) in ca.iter().zip(cb) {
                            all_eq &= x == y;
                        }
                        if !all_eq {
                            for (j, (x, y)) in ca.iter().zip(cb).enumerate() {
                                if x != y {
                                    return Some(i + j);
                                }
                            }
                        }
                        i += $lanes;
                    }
                    while i < a.len() {
                        if a[i] != b[i] {
                            return Some(i);
                        }
                        i += 1;
                    }
                    None
                }
            }
        )*
    };
}

// 256-bit-worth lane counts for the arithmetic primitives.
packed_impl! {
    u8 => 32,
    i8 => 32,
    u16 => 16,
    i16 => 16,
    u32 => 8,
    i32 => 8,
    f32 => 8,
    u64 => 4,
    i64 => 4,
    f64 => 4,
    usize => 4,
    isize => 4,
}

impl Pack for bool {}
impl Pack for char {}

/// Inner-loop driver selected by an execution policy's vectorization mode.
///
/// [`ScalarDriver`] accepts any element type and polls cancellation at
/// per-element granularity; [`PackedDriver`] requires the [`Pack`] contract
/// and works a pack at a time. The choice is an associated type on the
/// policy, so it is made at compile time with no dispatch overhead.
pub trait LoopDriver<T> {
    /// Granularity, in elements, at which cancellation-aware scans poll the
    /// token.
    const BLOCK: usize;

    /// Counts the elements of `run` equal to `needle`.
    fn count_eq(run: &[T], needle: &T) -> usize
    where
        T: PartialEq;

    /// Returns the first index at which `a` and `b` differ (equal lengths).
    fn mismatch(a: &[T], b: &[T]) -> Option<usize>
    where
        T: PartialEq;

    /// Clones `src` into `dst` (equal lengths).
    fn copy_run(src: &[T], dst: &mut [T])
    where
        T: Clone;
}

/// Element-at-a-time driver, available for every element type.
pub struct ScalarDriver;

impl<T> LoopDriver<T> for ScalarDriver {
    const BLOCK: usize = 1;

    fn count_eq(run: &[T], needle: &T) -> usize
    where
        T: PartialEq,
    {
        run.iter().filter(|x| *x == needle).count()
    }

    fn mismatch(a: &[T], b: &[T]) -> Option<usize>
    where
        T: PartialEq,
    {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).position(|(x, y)| x != y)
    }

    fn copy_run(src: &[T], dst: &mut [T])
    where
        T: Clone,
    {
        dst.clone_from_slice(src);
    }
}

/// Pack-at-a-time driver for types satisfying the [`Pack`] contract.
pub struct PackedDriver;

impl<T: Pack> LoopDriver<T> for PackedDriver {
    // Several packs per token poll keeps the vector body tight.
    const BLOCK: usize = if T::LANES > 1 { 4 * T::LANES } else { 1 };

    fn count_eq(run: &[T], needle: &T) -> usize {
        T::count_eq(run, needle)
    }

    fn mismatch(a: &[T], b: &[T]) -> Option<usize> {
        T::mismatch(a, b)
    }

    fn copy_run(src: &[T], dst: &mut [T]) {
        // `Pack: Copy`, so this is a plain memcpy.
        dst.copy_from_slice(src);
    }
}
