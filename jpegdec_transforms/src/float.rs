// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Floating point AAN inverse DCT. Multipliers carry the AAN scale factors.

use crate::{BLOCK_DIM, BLOCK_SIZE, range_limit};

#[inline(always)]
fn idct_1d(i: [f32; BLOCK_DIM]) -> [f32; BLOCK_DIM] {
    let tmp10 = i[0] + i[4];
    let tmp11 = i[0] - i[4];
    let tmp13 = i[2] + i[6];
    let tmp12 = (i[2] - i[6]) * 1.414_213_6 - tmp13;

    let tmp0 = tmp10 + tmp13;
    let tmp3 = tmp10 - tmp13;
    let tmp1 = tmp11 + tmp12;
    let tmp2 = tmp11 - tmp12;

    let z13 = i[5] + i[3];
    let z10 = i[5] - i[3];
    let z11 = i[1] + i[7];
    let z12 = i[1] - i[7];

    let tmp7 = z11 + z13;
    let tmp11 = (z11 - z13) * 1.414_213_6;

    let z5 = (z10 + z12) * 1.847_759;
    let tmp10 = 1.082_392_2 * z12 - z5;
    let tmp12 = -2.613_126 * z10 + z5;

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

pub fn idct_float(
    coef: &[i16; BLOCK_SIZE],
    quant: &[f32; BLOCK_SIZE],
    output: &mut [u8],
    stride: usize,
) {
    let mut ws = [0f32; BLOCK_SIZE];

    for col in 0..BLOCK_DIM {
        let input: [f32; BLOCK_DIM] = std::array::from_fn(|row| {
            let i = row * BLOCK_DIM + col;
            coef[i] as f32 * quant[i]
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
        let mut input = [0f32; BLOCK_DIM];
        input.copy_from_slice(w);
        for (o, v) in out.iter_mut().zip(idct_1d(input)) {
            // Truncate toward zero, then round the final /8 like the integer paths.
            *o = range_limit(((v as i64) + 4) >> 3);
        }
    }
}
