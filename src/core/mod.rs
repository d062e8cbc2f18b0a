// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Executor internals: the worker pool, the round-based job board, the
//! partitioner and its fan-out task, plus the loop and cancellation
//! primitives the algorithm front-ends are built from.

pub mod cancel;
pub mod loops;
pub mod pack;
pub mod partition;
pub mod pool;
pub(crate) mod sync;
pub(crate) mod util;
