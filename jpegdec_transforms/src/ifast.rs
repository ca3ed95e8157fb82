// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fast integer inverse DCT (Arai, Agui and Nakajima), 8-bit fixed point constants.
//!
//! The AAN output scaling is folded into the multipliers (see
//! [`crate::scales::ifast_multipliers`]), which also carry `PASS1_BITS` of extra precision.

use crate::{BLOCK_DIM, BLOCK_SIZE, descale, range_limit};

const CONST_BITS: u32 = 8;
const PASS1_BITS: u32 = 2;

const FIX_1_082392200: i64 = 277;
const FIX_1_414213562: i64 = 362;
const FIX_1_847759065: i64 = 473;
const FIX_2_613125930: i64 = 669;

#[inline(always)]
fn multiply(v: i64, c: i64) -> i64 {
    descale(v * c, CONST_BITS)
}

/// One 1-D pass over inputs in natural order, returning outputs in natural order.
#[inline(always)]
fn idct_1d(i: [i64; BLOCK_DIM]) -> [i64; BLOCK_DIM] {
    // Even part.
    let tmp10 = i[0] + i[4];
    let tmp11 = i[0] - i[4];
    let tmp13 = i[2] + i[6];
    let tmp12 = multiply(i[2] - i[6], FIX_1_414213562) - tmp13;

    let tmp0 = tmp10 + tmp13;
    let tmp3 = tmp10 - tmp13;
    let tmp1 = tmp11 + tmp12;
    let tmp2 = tmp11 - tmp12;

    // Odd part.
    let z13 = i[5] + i[3];
    let z10 = i[5] - i[3];
    let z11 = i[1] + i[7];
    let z12 = i[1] - i[7];

    let tmp7 = z11 + z13;
    let tmp11 = multiply(z11 - z13, FIX_1_414213562);

    let z5 = multiply(z10 + z12, FIX_1_847759065);
    let tmp10 = multiply(z12, FIX_1_082392200) - z5;
    let tmp12 = multiply(z10, -FIX_2_613125930) + z5;

    let tmp6 = tmp12 - tmp7;
    let tmp5 = tmp11 - tmp6;
    let tmp4 = tmp10 + tmp5;

    [
        tmp0 + tmp7,
        tmp1 + tmp6,
        tmp2 + tmp5,
        tmp3 - tmp4,
        tmp3 + tmp4,
        tmp2 - tmp5,
        tmp1 - tmp6,
        tmp0 - tmp7,
    ]
}

pub fn idct_ifast(
    coef: &[i16; BLOCK_SIZE],
    quant: &[i32; BLOCK_SIZE],
    output: &mut [u8],
    stride: usize,
) {
    let mut ws = [0i64; BLOCK_SIZE];

    for col in 0..BLOCK_DIM {
        let input: [i64; BLOCK_DIM] = std::array::from_fn(|row| {
            let i = row * BLOCK_DIM + col;
            coef[i] as i64 * quant[i] as i64
        });
        let column = if (1..BLOCK_DIM).all(|row| coef[row * BLOCK_DIM + col] == 0) {
            [input[0]; BLOCK_DIM]
        } else {
            idct_1d(input)
        };
        for (row, v) in column.into_iter().enumerate() {
            ws[row * BLOCK_DIM + col] = v;
        }
    }

    for (row, w) in ws.chunks_exact(BLOCK_DIM).enumerate() {
        let out = &mut output[row * stride..row * stride + BLOCK_DIM];
        if w[1..].iter().all(|&v| v == 0) {
            out.fill(range_limit(descale(w[0], PASS1_BITS + 3)));
            continue;
        }
        let mut input = [0i64; BLOCK_DIM];
        input.copy_from_slice(w);
        for (o, v) in out.iter_mut().zip(idct_1d(input)) {
            *o = range_limit(descale(v, PASS1_BITS + 3));
        }
    }
}
