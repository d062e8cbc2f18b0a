// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Cancellation token shared by the partitions of one algorithm invocation.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A shared monotone-minimum register recording the leftmost index at which
/// a partition found a decisive answer.
///
/// Created once per top-level invocation of an early-exit algorithm
/// (`equal`, `mismatch`, `find`, `lexicographical_compare`, ...), cloned
/// into every partition worker. Workers poll it to stop scanning early and
/// call [`cancel()`](Self::cancel) when they find a decisive element; the
/// merge step reads [`position()`](Self::position) to recover the leftmost
/// such index even though workers run out of order.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Shared>,
}

struct Shared {
    /// Leftmost cancelled index; `upper` means "never cancelled".
    first: CachePadded<AtomicUsize>,
    /// The token's original upper bound.
    upper: usize,
}

impl CancelToken {
    /// Creates a token over indices `0..upper`; `upper` doubles as the
    /// not-cancelled sentinel (the "not found" value for search-style
    /// algorithms).
    pub fn new(upper: usize) -> Self {
        Self {
            inner: Arc::new(Shared {
                first: CachePadded::new(AtomicUsize::new(upper)),
                upper,
            }),
        }
    }

    /// Records a cancellation at the given index, unless an earlier index
    /// was already recorded. The recorded index only ever decreases, so a
    /// late partition can never hide an earlier partition's answer.
    #[inline]
    pub fn cancel(&self, index: usize) {
        self.inner.first.fetch_min(index, Ordering::Relaxed);
    }

    /// Returns true if any partition recorded a cancellation.
    #[inline]
    pub fn was_cancelled(&self) -> bool {
        self.inner.first.load(Ordering::Relaxed) < self.inner.upper
    }

    /// Returns true if scanning at `index` is pointless: a cancellation at
    /// this or an earlier index has been recorded.
    #[inline]
    pub fn was_cancelled_at(&self, index: usize) -> bool {
        index >= self.inner.first.load(Ordering::Relaxed)
    }

    /// Returns the leftmost recorded index, or the upper bound if the run
    /// was never cancelled.
    #[inline]
    pub fn position(&self) -> usize {
        self.inner.first.load(Ordering::Relaxed)
    }

    /// The token's original upper bound.
    #[inline]
    pub fn upper(&self) -> usize {
        self.inner.upper
    }
}
