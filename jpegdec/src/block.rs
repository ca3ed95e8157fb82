// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::BLOCK_SIZE;

/// One 8x8 block of quantized DCT coefficients, in natural (row-major) order.
pub type Block = [i16; BLOCK_SIZE];

/// Natural-order position of each zigzag index.
#[rustfmt::skip]
pub const NATURAL_ORDER: [usize; BLOCK_SIZE] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// A quantization table, stored in natural order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantTable {
    values: [u16; BLOCK_SIZE],
}

impl QuantTable {
    pub fn new(values: [u16; BLOCK_SIZE]) -> Self {
        Self { values }
    }

    /// Builds a table from values listed in zigzag order, as they appear in a DQT segment.
    pub fn from_zigzag(zigzag: &[u16; BLOCK_SIZE]) -> Self {
        let mut values = [0; BLOCK_SIZE];
        for (k, &v) in zigzag.iter().enumerate() {
            values[NATURAL_ORDER[k]] = v;
        }
        Self { values }
    }

    pub fn values(&self) -> &[u16; BLOCK_SIZE] {
        &self.values
    }

    /// Value at natural-order position `pos`.
    pub fn at(&self, pos: usize) -> u16 {
        self.values[pos]
    }
}
