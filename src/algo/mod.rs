// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Algorithm front-ends. Each function body is written once and handed to
//! the policy, which decides between the inline sequential path and the
//! partitioned fan-out.

pub mod compare;
pub mod copy;
pub mod count;
pub mod heap;
pub mod reduce_by_key;
pub mod reorder;
pub mod sort;
