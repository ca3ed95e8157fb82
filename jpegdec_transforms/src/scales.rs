// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Dequantization multiplier tables for each inverse DCT.

use crate::{BLOCK_DIM, BLOCK_SIZE};

/// AAN scale factors `cos(k*PI/16) * sqrt(2)` (k != 0), scaled by 2^14.
#[rustfmt::skip]
const AAN_SCALES: [i32; BLOCK_SIZE] = [
    16384, 22725, 21407, 19266, 16384, 12873,  8867,  4520,
    22725, 31521, 29692, 26722, 22725, 17855, 12299,  6270,
    21407, 29692, 27969, 25172, 21407, 16819, 11585,  5906,
    19266, 26722, 25172, 22654, 19266, 15137, 10426,  5315,
    16384, 22725, 21407, 19266, 16384, 12873,  8867,  4520,
    12873, 17855, 16819, 15137, 12873, 10114,  6967,  3552,
     8867, 12299, 11585, 10426,  8867,  6967,  4799,  2446,
     4520,  6270,  5906,  5315,  4520,  3552,  2446,  1247,
];

const AAN_SCALE_FACTOR: [f64; BLOCK_DIM] = [
    1.0,
    1.387039845,
    1.306562965,
    1.175875602,
    1.0,
    0.785694958,
    0.541196100,
    0.275899379,
];

const IFAST_SCALE_BITS: u32 = 12;

pub fn islow_multipliers(quant: &[u16; BLOCK_SIZE]) -> [i32; BLOCK_SIZE] {
    quant.map(i32::from)
}

pub fn ifast_multipliers(quant: &[u16; BLOCK_SIZE]) -> [i32; BLOCK_SIZE] {
    std::array::from_fn(|i| {
        let v = quant[i] as i64 * AAN_SCALES[i] as i64;
        ((v + (1 << (IFAST_SCALE_BITS - 1))) >> IFAST_SCALE_BITS) as i32
    })
}

pub fn float_multipliers(quant: &[u16; BLOCK_SIZE]) -> [f32; BLOCK_SIZE] {
    std::array::from_fn(|i| {
        let (row, col) = (i / BLOCK_DIM, i % BLOCK_DIM);
        (quant[i] as f64 * AAN_SCALE_FACTOR[row] * AAN_SCALE_FACTOR[col]) as f32
    })
}
