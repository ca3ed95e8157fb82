// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Accurate integer inverse DCT (Loeffler, Ligtenberg and Moschytz), 13-bit fixed point.
//!
//! Columns are transformed first and kept with `PASS1_BITS` of extra precision, then rows.
//! Intermediates are 64-bit so that out-of-range coefficients cannot overflow.

use crate::{BLOCK_DIM, BLOCK_SIZE, descale, range_limit};

const CONST_BITS: u32 = 13;
const PASS1_BITS: u32 = 2;

const FIX_0_298631336: i64 = 2446;
const FIX_0_390180644: i64 = 3196;
const FIX_0_541196100: i64 = 4433;
const FIX_0_765366865: i64 = 6270;
const FIX_0_899976223: i64 = 7373;
const FIX_1_175875602: i64 = 9633;
const FIX_1_501321110: i64 = 12299;
const FIX_1_847759065: i64 = 15137;
const FIX_1_961570560: i64 = 16069;
const FIX_2_053119869: i64 = 16819;
const FIX_2_562915447: i64 = 20995;
const FIX_3_072711026: i64 = 25172;

/// Even half of the 1-D transform: returns (tmp10, tmp11, tmp12, tmp13).
#[inline(always)]
fn even_part(in0: i64, in2: i64, in4: i64, in6: i64) -> (i64, i64, i64, i64) {
    let z1 = (in2 + in6) * FIX_0_541196100;
    let tmp2 = z1 - in6 * FIX_1_847759065;
    let tmp3 = z1 + in2 * FIX_0_765366865;

    let tmp0 = (in0 + in4) << CONST_BITS;
    let tmp1 = (in0 - in4) << CONST_BITS;

    (tmp0 + tmp3, tmp1 + tmp2, tmp1 - tmp2, tmp0 - tmp3)
}

/// Odd half of the 1-D transform: returns (tmp0, tmp1, tmp2, tmp3).
#[inline(always)]
fn odd_part(in7: i64, in5: i64, in3: i64, in1: i64) -> (i64, i64, i64, i64) {
    let z1 = in7 + in1;
    let z2 = in5 + in3;
    let z3 = in7 + in3;
    let z4 = in5 + in1;
    let z5 = (z3 + z4) * FIX_1_175875602;

    let tmp0 = in7 * FIX_0_298631336;
    let tmp1 = in5 * FIX_2_053119869;
    let tmp2 = in3 * FIX_3_072711026;
    let tmp3 = in1 * FIX_1_501321110;

    let z1 = -z1 * FIX_0_899976223;
    let z2 = -z2 * FIX_2_562915447;
    let z3 = -z3 * FIX_1_961570560 + z5;
    let z4 = -z4 * FIX_0_390180644 + z5;

    (tmp0 + z1 + z3, tmp1 + z2 + z4, tmp2 + z2 + z3, tmp3 + z1 + z4)
}

pub fn idct_islow(
    coef: &[i16; BLOCK_SIZE],
    quant: &[i32; BLOCK_SIZE],
    output: &mut [u8],
    stride: usize,
) {
    let mut ws = [0i64; BLOCK_SIZE];

    for col in 0..BLOCK_DIM {
        let dequant = |row: usize| {
            let i = row * BLOCK_DIM + col;
            coef[i] as i64 * quant[i] as i64
        };
        if (1..BLOCK_DIM).all(|row| coef[row * BLOCK_DIM + col] == 0) {
            // AC terms all zero: the column is flat.
            let dc = dequant(0) << PASS1_BITS;
            for row in 0..BLOCK_DIM {
                ws[row * BLOCK_DIM + col] = dc;
            }
            continue;
        }

        let (tmp10, tmp11, tmp12, tmp13) = even_part(dequant(0), dequant(2), dequant(4), dequant(6));
        let (tmp0, tmp1, tmp2, tmp3) = odd_part(dequant(7), dequant(5), dequant(3), dequant(1));

        let shift = CONST_BITS - PASS1_BITS;
        ws[col] = descale(tmp10 + tmp3, shift);
        ws[7 * BLOCK_DIM + col] = descale(tmp10 - tmp3, shift);
        ws[BLOCK_DIM + col] = descale(tmp11 + tmp2, shift);
        ws[6 * BLOCK_DIM + col] = descale(tmp11 - tmp2, shift);
        ws[2 * BLOCK_DIM + col] = descale(tmp12 + tmp1, shift);
        ws[5 * BLOCK_DIM + col] = descale(tmp12 - tmp1, shift);
        ws[3 * BLOCK_DIM + col] = descale(tmp13 + tmp0, shift);
        ws[4 * BLOCK_DIM + col] = descale(tmp13 - tmp0, shift);
    }

    for (row, w) in ws.chunks_exact(BLOCK_DIM).enumerate() {
        let out = &mut output[row * stride..row * stride + BLOCK_DIM];
        if w[1..].iter().all(|&v| v == 0) {
            out.fill(range_limit(descale(w[0], PASS1_BITS + 3)));
            continue;
        }

        let (tmp10, tmp11, tmp12, tmp13) = even_part(w[0], w[2], w[4], w[6]);
        let (tmp0, tmp1, tmp2, tmp3) = odd_part(w[7], w[5], w[3], w[1]);

        let shift = CONST_BITS + PASS1_BITS + 3;
        out[0] = range_limit(descale(tmp10 + tmp3, shift));
        out[7] = range_limit(descale(tmp10 - tmp3, shift));
        out[1] = range_limit(descale(tmp11 + tmp2, shift));
        out[6] = range_limit(descale(tmp11 - tmp2, shift));
        out[2] = range_limit(descale(tmp12 + tmp1, shift));
        out[5] = range_limit(descale(tmp12 - tmp1, shift));
        out[3] = range_limit(descale(tmp13 + tmp0, shift));
        out[4] = range_limit(descale(tmp13 - tmp0, shift));
    }
}
