// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! 8x8 inverse DCTs that turn one dequantized coefficient block into 8-bit samples.
//!
//! Three numeric methods are provided, matching the classic decoder choices:
//! an exact integer transform (`islow`), a faster, slightly less accurate
//! integer AAN transform (`ifast`) and a floating point AAN transform (`float`).
//! Each method consumes coefficients in natural (row-major) order together with
//! a method-specific table of dequantization multipliers built by [`Multipliers::new`].

pub mod float;
pub mod ifast;
pub mod islow;
pub mod scales;

pub use float::idct_float;
pub use ifast::idct_ifast;
pub use islow::idct_islow;

pub const BLOCK_DIM: usize = 8;
pub const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;

/// Value added to every output sample to undo the encoder's level shift.
pub const CENTER_SAMPLE: i64 = 128;
pub const MAX_SAMPLE: i64 = 255;

/// Numeric method used for the inverse transform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DctMethod {
    /// Accurate integer transform (LLM, 13-bit constants).
    #[default]
    IntegerSlow,
    /// Fast integer AAN transform, less accurate.
    IntegerFast,
    /// Floating point AAN transform.
    Float,
}

/// Dequantization multipliers, laid out the way the corresponding transform wants them.
#[derive(Clone, Debug, PartialEq)]
pub enum Multipliers {
    IntegerSlow([i32; BLOCK_SIZE]),
    IntegerFast([i32; BLOCK_SIZE]),
    Float([f32; BLOCK_SIZE]),
}

impl Multipliers {
    /// Builds the multiplier table for `method` from a quantization table in natural order.
    pub fn new(method: DctMethod, quant: &[u16; BLOCK_SIZE]) -> Self {
        match method {
            DctMethod::IntegerSlow => Self::IntegerSlow(scales::islow_multipliers(quant)),
            DctMethod::IntegerFast => Self::IntegerFast(scales::ifast_multipliers(quant)),
            DctMethod::Float => Self::Float(scales::float_multipliers(quant)),
        }
    }

    /// A table that maps every block to a flat mid-grey output.
    pub fn zeroed(method: DctMethod) -> Self {
        Self::new(method, &[0; BLOCK_SIZE])
    }
}

/// Inverse transforms `coef` and writes an 8x8 block of samples to `output`.
///
/// Sample `(x, y)` of the block lands at `output[y * stride + x]`, so `output` must hold at
/// least `7 * stride + 8` samples.
#[inline]
pub fn inverse_dct(
    coef: &[i16; BLOCK_SIZE],
    multipliers: &Multipliers,
    output: &mut [u8],
    stride: usize,
) {
    debug_assert!(stride >= BLOCK_DIM);
    debug_assert!(output.len() >= (BLOCK_DIM - 1) * stride + BLOCK_DIM);
    match multipliers {
        Multipliers::IntegerSlow(m) => idct_islow(coef, m, output, stride),
        Multipliers::IntegerFast(m) => idct_ifast(coef, m, output, stride),
        Multipliers::Float(m) => idct_float(coef, m, output, stride),
    }
}

#[inline(always)]
pub(crate) fn descale(x: i64, n: u32) -> i64 {
    (x + (1 << (n - 1))) >> n
}

#[inline(always)]
pub(crate) fn range_limit(x: i64) -> u8 {
    (x + CENTER_SAMPLE).clamp(0, MAX_SAMPLE) as u8
}
