// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#[cfg(test)]
pub(crate) mod test;
pub mod tracing_wrappers;
mod vec_helpers;

pub use vec_helpers::*;

/// Rounds `value` up to the next multiple of `multiple`.
pub fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}
