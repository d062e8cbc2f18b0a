// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The cancellation-aware scan loop used by the early-exit algorithms.
//! Elements are always processed in range order.

use super::cancel::CancelToken;
use std::ops::ControlFlow;

/// Applies `step(global_index, element)` in order, polling the cancellation
/// token after every element and stopping as soon as the token records an
/// index at or before the current one.
///
/// A step returning [`ControlFlow::Break`] cancels the token at its own
/// index and ends the loop.
#[inline]
pub fn bounded_loop<T>(
    token: &CancelToken,
    base: usize,
    run: &[T],
    mut step: impl FnMut(usize, &T) -> ControlFlow<()>,
) {
    for (offset, item) in run.iter().enumerate() {
        let index = base + offset;
        if token.was_cancelled_at(index) {
            return;
        }
        if let ControlFlow::Break(()) = step(index, item) {
            token.cancel(index);
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounded_loop_stops_at_break_and_cancels() {
        let token = CancelToken::new(10);
        let run = [0, 1, 2, 3, 4];
        let mut visited = 0;
        bounded_loop(&token, 0, &run, |i, _| {
            visited += 1;
            if i == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(visited, 3);
        assert_eq!(token.position(), 2);
    }

    #[test]
    fn bounded_loop_respects_prior_cancellation() {
        let token = CancelToken::new(10);
        token.cancel(5);
        let run = [0u8; 5];
        let mut visited = 0;
        // Indices 5..10 are all at or past the cancellation point.
        bounded_loop(&token, 5, &run, |_, _| {
            visited += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(visited, 0);

        // Earlier indices still run.
        bounded_loop(&token, 0, &run, |_, _| {
            visited += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(visited, 5);
    }
}
