// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Block smoothing for partially decoded progressive images (ITU-T T.81, K.8).
//!
//! While the low-frequency AC coefficients of a block are still missing, they are estimated
//! from the DC values of the 3x3 neighbourhood of blocks, which hides most of the blockiness
//! of early output passes.

use super::{CoefController, DecodeStatus, Store};
use crate::{
    BLOCK_DIM,
    block::{Block, QuantTable},
    entropy::ScanSource,
    error::{Error, Result},
    idct::Idct,
    image::Plane,
    input::{DecodeContext, InputStatus, consume_input},
    util::tracing_wrappers::*,
};

/// Coefficients whose precision is latched: DC and the first five AC in zigzag order.
pub const SAVED_COEFS: usize = 6;

const Q01_POS: usize = 1;
const Q10_POS: usize = 8;
const Q20_POS: usize = 16;
const Q11_POS: usize = 9;
const Q02_POS: usize = 2;

/// Natural-order position of each latched coefficient.
pub(super) const SMOOTHED_POS: [usize; SAVED_COEFS] =
    [0, Q01_POS, Q10_POS, Q20_POS, Q11_POS, Q02_POS];

/// Estimate for one coefficient: `num / (q * 256)` rounded half away from zero, with the
/// magnitude limited to what the `al` missing bits can hold.
fn estimate(num: i64, q: i64, al: i32) -> i16 {
    let limit = |pred: i64| {
        if al > 0 && pred >= 1 << al {
            (1 << al) - 1
        } else {
            pred
        }
    };
    let pred = if num >= 0 {
        limit(((q << 7) + num) / (q << 8))
    } else {
        -limit(((q << 7) - num) / (q << 8))
    };
    pred as i16
}

/// Fills in still-zero low-frequency coefficients of `block`.
///
/// `dc` holds the DC values around the block, row by row, with the block itself at `dc[4]`.
/// `bits` is the latched precision of the component.
fn smooth_block(block: &mut Block, dc: &[i64; 9], quant: &QuantTable, bits: &[i32; SAVED_COEFS]) {
    let [dc1, dc2, dc3, dc4, dc5, dc6, dc7, dc8, dc9] = *dc;
    let q00 = quant.at(0) as i64;
    let num = [
        0,
        36 * q00 * (dc4 - dc6),
        36 * q00 * (dc2 - dc8),
        9 * q00 * (dc2 + dc8 - 2 * dc5),
        5 * q00 * (dc1 - dc3 - dc7 + dc9),
        9 * q00 * (dc4 + dc6 - 2 * dc5),
    ];
    for k in 1..SAVED_COEFS {
        let pos = SMOOTHED_POS[k];
        let al = bits[k];
        // Only coefficients that are still zero and not fully known.
        if al != 0 && block[pos] == 0 {
            block[pos] = estimate(num[k], quant.at(pos) as i64, al);
        }
    }
}

fn block_row_of(window: &[Block], blocks_per_row: usize, row: usize) -> &[Block] {
    &window[row * blocks_per_row..(row + 1) * blocks_per_row]
}

impl CoefController {
    /// Decides whether smoothing can and should be used for the coming output pass, and
    /// latches the current coefficient precision if so.
    pub(super) fn smoothing_ok(&mut self, ctx: &DecodeContext) -> bool {
        if !cfg!(feature = "smoothing") || !ctx.frame.progressive {
            return false;
        }
        let Some(coef_bits) = ctx.coef_bits.as_ref() else {
            return false;
        };
        let num_components = ctx.frame.num_components();
        let latch = self
            .coef_bits_latch
            .get_or_insert_with(|| vec![[0; SAVED_COEFS]; num_components]);

        let mut useful = false;
        for (c, comp) in ctx.frame.components.iter().enumerate() {
            let Some(quant) = comp.quant_table.as_ref() else {
                return false;
            };
            // Zero quantizers would divide by zero.
            if SMOOTHED_POS.iter().any(|&pos| quant.at(pos) == 0) {
                return false;
            }
            let bits = coef_bits.component(c);
            if bits[0] < 0 {
                return false;
            }
            for k in 1..SAVED_COEFS {
                latch[c][k] = bits[k];
                if bits[k] != 0 {
                    useful = true;
                }
            }
        }
        useful
    }

    pub(super) fn decompress_smooth_data(
        &mut self,
        ctx: &mut DecodeContext,
        source: &mut dyn ScanSource,
        idct: &Idct,
        output: &mut [Plane],
    ) -> Result<DecodeStatus> {
        // Keep the input ahead of the output. During a DC scan it must be one row further,
        // so the DC values of the next block row are up to date.
        while ctx.input_scan_number <= ctx.output_scan_number && !ctx.eoi_reached {
            if ctx.input_scan_number == ctx.output_scan_number {
                let delta = ctx.scan.as_ref().is_some_and(|s| s.is_dc_scan()) as usize;
                if ctx.input_imcu_row > ctx.output_imcu_row + delta {
                    break;
                }
            }
            if consume_input(self, ctx, source)? == InputStatus::Suspended {
                return Ok(DecodeStatus::Suspended);
            }
        }

        let Store::FullImage { arrays } = &mut self.store else {
            return Err(Error::InvalidState("smoothing without coefficient arrays"));
        };
        let latch = self
            .coef_bits_latch
            .as_ref()
            .ok_or(Error::InvalidState("smoothing without latched precision"))?;
        let frame = &ctx.frame;
        let output_row = ctx.output_imcu_row;
        let last_imcu_row = frame.total_imcu_rows - 1;
        let mut workspace: Vec<Block> = Vec::new();

        for (c, (comp, array)) in frame.components.iter().zip(arrays.iter_mut()).enumerate() {
            if !comp.component_needed {
                continue;
            }
            let quant = comp
                .quant_table
                .as_ref()
                .ok_or(Error::MissingQuantTable(comp.quant_table_slot))?;
            let bits = &latch[c];
            let v = comp.v_samp_factor;

            let (block_rows, mut access_rows, last_row) = if output_row < last_imcu_row {
                // This iMCU row and the next.
                (v, 2 * v, false)
            } else {
                let rows = comp.block_rows_in_imcu_row(output_row, frame.total_imcu_rows);
                (rows, rows, true)
            };
            let (start_row, offset, first_row) = if output_row > 0 {
                access_rows += v;
                ((output_row - 1) * v, v, false)
            } else {
                (0, 0, true)
            };
            let blocks_per_row = array.blocks_per_row();
            let window: &[Block] = array.access(start_row, access_rows, false)?;

            let last_col = comp.width_in_blocks - 1;
            for block_row in 0..block_rows {
                let r = offset + block_row;
                let cur = block_row_of(window, blocks_per_row, r);
                let prev = if first_row && block_row == 0 {
                    cur
                } else {
                    block_row_of(window, blocks_per_row, r - 1)
                };
                let next = if last_row && block_row == block_rows - 1 {
                    cur
                } else {
                    block_row_of(window, blocks_per_row, r + 1)
                };

                // Sliding DC registers: left, centre and right column of the neighbourhood.
                // Starting with every column at the first block handles one-block-wide images.
                let (p, c0, n) = (prev[0][0] as i64, cur[0][0] as i64, next[0][0] as i64);
                let mut dc = [p, p, p, c0, c0, c0, n, n, n];
                workspace.clear();
                workspace.try_reserve(comp.width_in_blocks)?;
                for col in 0..=last_col {
                    let mut block = cur[col];
                    if col < last_col {
                        dc[2] = prev[col + 1][0] as i64;
                        dc[5] = cur[col + 1][0] as i64;
                        dc[8] = next[col + 1][0] as i64;
                    }
                    smooth_block(&mut block, &dc, quant, bits);
                    workspace.push(block);
                    dc.copy_within(1..3, 0);
                    dc.copy_within(4..6, 3);
                    dc.copy_within(7..9, 6);
                }
                idct.transform_block_row(c, &workspace, &mut output[c], block_row * BLOCK_DIM);
            }
        }
        trace!("smoothed iMCU row {output_row}");

        ctx.output_imcu_row += 1;
        if ctx.output_imcu_row < frame.total_imcu_rows {
            Ok(DecodeStatus::RowCompleted)
        } else {
            Ok(DecodeStatus::ScanCompleted)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::BLOCK_SIZE;
    use test_log::test;

    fn flat_quant(value: u16) -> QuantTable {
        QuantTable::new([value; BLOCK_SIZE])
    }

    #[test]
    fn estimate_rounds_and_clamps() {
        // 36 * 8 * 20 / (4 * 256) = 5.625
        assert_eq!(estimate(36 * 8 * 20, 4, 3), 6);
        assert_eq!(estimate(-36 * 8 * 20, 4, 3), -6);
        assert_eq!(estimate(36 * 8 * 20, 4, 2), 3);
        assert_eq!(estimate(-36 * 8 * 20, 4, 2), -3);
        // No limit while nothing is known about the coefficient.
        assert_eq!(estimate(36 * 8 * 20, 4, -1), 6);
        // Exactly half rounds away from zero.
        assert_eq!(estimate(128, 1, 5), 1);
        assert_eq!(estimate(-128, 1, 5), -1);
        assert_eq!(estimate(127, 1, 5), 0);
    }

    #[test]
    fn horizontal_gradient() {
        let quant = flat_quant(2);
        let mut block = [0; BLOCK_SIZE];
        // DC falls by 10 per block from left to right.
        let dc = [10, 0, -10, 10, 0, -10, 10, 0, -10];
        smooth_block(&mut block, &dc, &quant, &[0, 4, 4, 4, 4, 4]);
        // 36 * 2 * 20 = 1440; (256 + 1440) / 512 = 3
        assert_eq!(block[Q01_POS], 3);
        assert_eq!(block[Q10_POS], 0);
        assert_eq!(block[Q20_POS], 0);
        assert_eq!(block[Q11_POS], 0);
        assert_eq!(block[Q02_POS], 0);
    }

    #[test]
    fn known_coefficients_untouched() {
        let quant = flat_quant(1);
        let dc = [30, 50, 0, 50, -40, 20, 0, 50, 30];
        let bits = [0, 0, 3, 3, 3, 3];
        let mut block = [0; BLOCK_SIZE];
        block[Q10_POS] = -2;
        let before = block;
        smooth_block(&mut block, &dc, &quant, &bits);
        // Fully known (0 bits missing): left alone even though still zero.
        assert_eq!(block[Q01_POS], 0);
        // Already nonzero: left alone.
        assert_eq!(block[Q10_POS], -2);
        // Missing and zero: estimated, within the 3 missing bits.
        for pos in [Q20_POS, Q11_POS, Q02_POS] {
            assert_ne!(block[pos], 0, "position {pos}");
            assert!(block[pos].abs() <= 7);
        }
        for pos in (0..BLOCK_SIZE).filter(|p| ![Q20_POS, Q11_POS, Q02_POS].contains(p)) {
            assert_eq!(block[pos], before[pos], "position {pos}");
        }
    }

    #[test]
    fn flat_neighbourhood_estimates_zero() {
        let quant = flat_quant(3);
        let mut block = [0; BLOCK_SIZE];
        smooth_block(&mut block, &[7; 9], &quant, &[1; SAVED_COEFS]);
        assert_eq!(block, [0; BLOCK_SIZE]);
    }
}
