// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The coefficient controller: sits between the entropy decoder and the inverse DCT.
//!
//! Single-scan images go through a one-MCU scratch buffer, and every MCU is transformed as soon
//! as it is decoded. Multi-scan images are first gathered in whole-image [`BlockArray`]s; the
//! input side fills them one iMCU row at a time ([`CoefController::consume_data`]) and the
//! output side transforms finished rows ([`CoefController::decompress_data`]), pulling more
//! input when it gets ahead.
//!
//! All cursors live either here or in the [`DecodeContext`], so any call that reports
//! [`DecodeStatus::Suspended`] can simply be repeated once more input is available.

mod smooth;

use crate::{
    BLOCK_DIM, BLOCK_SIZE, MAX_BLOCKS_IN_MCU, MAX_COMPS_IN_SCAN,
    block::Block,
    entropy::{McuStatus, ScanSource},
    error::{Error, Result},
    headers::{FrameInfo, ScanInfo},
    idct::Idct,
    image::Plane,
    input::{DecodeContext, InputStatus, consume_input, finish_input_pass},
    mem::BlockArray,
    options::DecompressOptions,
    util::{tracing_wrappers::*, try_filled_vec},
};

pub use smooth::SAVED_COEFS;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeStatus {
    /// One more iMCU row was completed.
    RowCompleted,
    /// The last iMCU row of the scan (or of the output pass) was completed.
    ScanCompleted,
    /// Out of input; call again once more data is available.
    Suspended,
}

#[derive(Debug)]
enum Store {
    SinglePass,
    FullImage { arrays: Vec<BlockArray> },
}

/// How [`CoefController::decompress_data`] produces samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Producer {
    /// Decode and transform in lockstep, one MCU at a time.
    SinglePass,
    /// Transform finished rows of the whole-image arrays.
    Buffered,
    /// Like `Buffered`, estimating missing low-frequency coefficients first.
    Smoothing,
}

#[derive(Debug)]
pub struct CoefController {
    store: Store,
    producer: Producer,
    /// One MCU of blocks: decoded in place by the single-pass producer, and a scratch copy of
    /// the arrays' blocks while consuming multi-scan input.
    mcu_buffer: Vec<Block>,
    /// MCUs already processed in the current MCU row.
    mcu_ctr: usize,
    /// MCU rows already processed within the current iMCU row.
    mcu_vert_offset: usize,
    mcu_rows_per_imcu_row: usize,
    /// Per component, the precision of the first coefficients as of the start of the output
    /// pass. Allocated the first time smoothing is considered.
    coef_bits_latch: Option<Vec<[i32; SAVED_COEFS]>>,
}

impl CoefController {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(frame, options), err)
    )]
    pub fn new(
        frame: &FrameInfo,
        need_full_buffer: bool,
        options: &DecompressOptions,
    ) -> Result<Self> {
        let (store, producer) = if need_full_buffer {
            (full_image_store(frame, options)?, Producer::Buffered)
        } else {
            (Store::SinglePass, Producer::SinglePass)
        };
        Ok(Self {
            store,
            producer,
            mcu_buffer: try_filled_vec(MAX_BLOCKS_IN_MCU, [0; BLOCK_SIZE])?,
            mcu_ctr: 0,
            mcu_vert_offset: 0,
            mcu_rows_per_imcu_row: 0,
            coef_bits_latch: None,
        })
    }

    pub fn has_full_buffer(&self) -> bool {
        matches!(self.store, Store::FullImage { .. })
    }

    pub fn producer(&self) -> Producer {
        self.producer
    }

    /// The whole-image arrays, one per component, if this controller keeps them.
    pub fn coefficient_arrays(&mut self) -> Option<&mut [BlockArray]> {
        match &mut self.store {
            Store::FullImage { arrays } => Some(arrays),
            Store::SinglePass => None,
        }
    }

    /// Resets the within-row counters for the iMCU row the input side is about to read.
    fn start_imcu_row(&mut self, frame: &FrameInfo, scan: &ScanInfo, input_imcu_row: usize) {
        self.mcu_rows_per_imcu_row = if scan.is_interleaved() {
            1
        } else if input_imcu_row + 1 < frame.total_imcu_rows {
            frame.components[scan.components[0].index].v_samp_factor
        } else {
            scan.components[0].last_row_height
        };
        self.mcu_ctr = 0;
        self.mcu_vert_offset = 0;
    }

    /// Prepares for reading the scan now in `ctx.scan`.
    pub fn start_input_pass(&mut self, ctx: &mut DecodeContext) -> Result<()> {
        ctx.input_imcu_row = 0;
        let scan = ctx
            .scan
            .as_ref()
            .ok_or(Error::InvalidState("input pass without a scan"))?;
        self.start_imcu_row(&ctx.frame, scan, 0);
        Ok(())
    }

    /// Prepares for an output pass, choosing between the plain and the smoothing producer
    /// when the whole-image arrays are in use.
    pub fn start_output_pass(&mut self, ctx: &mut DecodeContext, block_smoothing: bool) {
        if self.has_full_buffer() {
            self.producer = if block_smoothing && self.smoothing_ok(ctx) {
                Producer::Smoothing
            } else {
                Producer::Buffered
            };
            debug!(
                "output pass for scan {} uses {:?} producer",
                ctx.output_scan_number, self.producer
            );
        }
        ctx.output_imcu_row = 0;
    }

    /// Reads one iMCU row of the current scan into the whole-image arrays.
    ///
    /// Without whole-image arrays, input is consumed by [`Self::decompress_data`] instead and
    /// this always reports [`DecodeStatus::Suspended`].
    pub fn consume_data(
        &mut self,
        ctx: &mut DecodeContext,
        source: &mut dyn ScanSource,
    ) -> Result<DecodeStatus> {
        let Store::FullImage { arrays } = &mut self.store else {
            return Ok(DecodeStatus::Suspended);
        };
        let scan = ctx
            .scan
            .as_ref()
            .ok_or(Error::InvalidState("consuming data outside a scan"))?;
        let frame = &ctx.frame;

        {
            // Windows over this iMCU row, in scan order.
            let mut windows: [Option<RowWindow>; MAX_COMPS_IN_SCAN] = Default::default();
            for (index, array) in arrays.iter_mut().enumerate() {
                let Some(pos) = scan.components.iter().position(|sc| sc.index == index) else {
                    continue;
                };
                let v = frame.components[index].v_samp_factor;
                let blocks_per_row = array.blocks_per_row();
                let window = array.access(ctx.input_imcu_row * v, v, true)?;
                windows[pos] = Some((window, blocks_per_row));
            }

            let decoder = source.entropy_decoder();
            for yoffset in self.mcu_vert_offset..self.mcu_rows_per_imcu_row {
                for col in self.mcu_ctr..scan.mcus_per_row {
                    let mcu = &mut self.mcu_buffer;
                    let n = copy_mcu(&mut windows, scan, col, yoffset, mcu, McuCopy::Gather)?;
                    if decoder.decode_mcu(&mut mcu[..n])? == McuStatus::NeedsMoreInput {
                        trace!(
                            "suspended reading iMCU row {} at MCU row {yoffset}, column {col}",
                            ctx.input_imcu_row
                        );
                        self.mcu_vert_offset = yoffset;
                        self.mcu_ctr = col;
                        return Ok(DecodeStatus::Suspended);
                    }
                    copy_mcu(&mut windows, scan, col, yoffset, mcu, McuCopy::Scatter)?;
                }
                self.mcu_ctr = 0;
            }
        }

        ctx.input_imcu_row += 1;
        if ctx.input_imcu_row < frame.total_imcu_rows {
            self.start_imcu_row(frame, scan, ctx.input_imcu_row);
            return Ok(DecodeStatus::RowCompleted);
        }
        finish_input_pass(ctx);
        Ok(DecodeStatus::ScanCompleted)
    }

    /// Produces the samples of the next iMCU row into `output`, one plane per component, each
    /// sized as [`FrameInfo::imcu_row_buffer_size`].
    pub fn decompress_data(
        &mut self,
        ctx: &mut DecodeContext,
        source: &mut dyn ScanSource,
        idct: &Idct,
        output: &mut [Plane],
    ) -> Result<DecodeStatus> {
        let frame = &ctx.frame;
        if output.len() != frame.num_components() {
            return Err(Error::OutputBufferCount(
                frame.num_components(),
                output.len(),
            ));
        }
        for (c, plane) in output.iter().enumerate() {
            let (w, h) = plane.size();
            let (ew, eh) = frame.imcu_row_buffer_size(c);
            if (w, h) != (ew, eh) {
                return Err(Error::OutputBufferMismatch(c, w, h, ew, eh));
            }
        }
        if ctx.output_imcu_row >= frame.total_imcu_rows {
            return Err(Error::InvalidState("output pass already complete"));
        }

        match self.producer {
            Producer::SinglePass => self.decompress_onepass(ctx, source, idct, output),
            Producer::Buffered => self.decompress_buffered(ctx, source, idct, output),
            Producer::Smoothing => self.decompress_smooth_data(ctx, source, idct, output),
        }
    }

    fn decompress_onepass(
        &mut self,
        ctx: &mut DecodeContext,
        source: &mut dyn ScanSource,
        idct: &Idct,
        output: &mut [Plane],
    ) -> Result<DecodeStatus> {
        let Store::SinglePass = self.store else {
            return Err(Error::InvalidState("single-pass decoding with coefficient arrays"));
        };
        let scan = ctx
            .scan
            .as_ref()
            .ok_or(Error::InvalidState("decoding outside a scan"))?;
        let frame = &ctx.frame;
        let last_mcu_col = scan.mcus_per_row - 1;
        let last_imcu_row = frame.total_imcu_rows - 1;
        let blocks = &mut self.mcu_buffer[..scan.blocks_in_mcu];

        for yoffset in self.mcu_vert_offset..self.mcu_rows_per_imcu_row {
            for col in self.mcu_ctr..=last_mcu_col {
                // Coefficients the scan does not code must read as zero.
                blocks.fill([0; BLOCK_SIZE]);
                let status = source.entropy_decoder().decode_mcu(blocks)?;
                if status == McuStatus::NeedsMoreInput {
                    trace!(
                        "suspended in iMCU row {} at MCU row {yoffset}, column {col}",
                        ctx.input_imcu_row
                    );
                    self.mcu_vert_offset = yoffset;
                    self.mcu_ctr = col;
                    return Ok(DecodeStatus::Suspended);
                }

                // Dummy blocks past the right and bottom edges are skipped, but still counted.
                let mut blkn = 0;
                for sc in scan.components.iter() {
                    if !frame.components[sc.index].component_needed {
                        blkn += sc.mcu_blocks;
                        continue;
                    }
                    let useful_width = if col < last_mcu_col {
                        sc.mcu_width
                    } else {
                        sc.last_col_width
                    };
                    let start_x = col * sc.mcu_sample_width;
                    for yindex in 0..sc.mcu_height {
                        if ctx.input_imcu_row < last_imcu_row
                            || yoffset + yindex < sc.last_row_height
                        {
                            let y = (yoffset + yindex) * BLOCK_DIM;
                            for xindex in 0..useful_width {
                                idct.transform_block(
                                    sc.index,
                                    &blocks[blkn + xindex],
                                    &mut output[sc.index],
                                    start_x + xindex * BLOCK_DIM,
                                    y,
                                );
                            }
                        }
                        blkn += sc.mcu_width;
                    }
                }
            }
            self.mcu_ctr = 0;
        }

        ctx.output_imcu_row += 1;
        ctx.input_imcu_row += 1;
        if ctx.input_imcu_row < frame.total_imcu_rows {
            self.start_imcu_row(frame, scan, ctx.input_imcu_row);
            return Ok(DecodeStatus::RowCompleted);
        }
        finish_input_pass(ctx);
        Ok(DecodeStatus::ScanCompleted)
    }

    fn decompress_buffered(
        &mut self,
        ctx: &mut DecodeContext,
        source: &mut dyn ScanSource,
        idct: &Idct,
        output: &mut [Plane],
    ) -> Result<DecodeStatus> {
        // The input must have finished the row we are about to show.
        while ctx.input_scan_number < ctx.output_scan_number
            || (ctx.input_scan_number == ctx.output_scan_number
                && ctx.input_imcu_row <= ctx.output_imcu_row)
        {
            match consume_input(self, ctx, source)? {
                InputStatus::Suspended => return Ok(DecodeStatus::Suspended),
                // Truncated input: show whatever the arrays hold.
                InputStatus::ReachedEoi => break,
                _ => {}
            }
        }
        debug_assert!(
            ctx.eoi_reached
                || ctx.input_scan_number > ctx.output_scan_number
                || ctx.input_imcu_row > ctx.output_imcu_row
        );

        let Store::FullImage { arrays } = &mut self.store else {
            return Err(Error::InvalidState("buffered output without coefficient arrays"));
        };
        let frame = &ctx.frame;
        for (c, (comp, array)) in frame.components.iter().zip(arrays.iter_mut()).enumerate() {
            if !comp.component_needed {
                continue;
            }
            let v = comp.v_samp_factor;
            let blocks_per_row = array.blocks_per_row();
            let window = array.access(ctx.output_imcu_row * v, v, false)?;
            let block_rows = comp.block_rows_in_imcu_row(ctx.output_imcu_row, frame.total_imcu_rows);
            for (r, row) in window.chunks_exact(blocks_per_row).take(block_rows).enumerate() {
                idct.transform_block_row(
                    c,
                    &row[..comp.width_in_blocks],
                    &mut output[c],
                    r * BLOCK_DIM,
                );
            }
        }

        ctx.output_imcu_row += 1;
        if ctx.output_imcu_row < frame.total_imcu_rows {
            Ok(DecodeStatus::RowCompleted)
        } else {
            Ok(DecodeStatus::ScanCompleted)
        }
    }
}

/// The blocks of one component in the iMCU row being read, and the array's row length.
type RowWindow<'a> = (&'a mut [Block], usize);

#[derive(Copy, Clone, PartialEq, Eq)]
enum McuCopy {
    /// Arrays to MCU buffer.
    Gather,
    /// MCU buffer back to the arrays.
    Scatter,
}

/// Copies the blocks of the MCU at `col` and MCU row `yoffset` between the row windows and
/// `mcu`, in MCU order. Returns the number of blocks in the MCU.
fn copy_mcu(
    windows: &mut [Option<RowWindow>],
    scan: &ScanInfo,
    col: usize,
    yoffset: usize,
    mcu: &mut [Block],
    direction: McuCopy,
) -> Result<usize> {
    let mut blkn = 0;
    for (sc, slot) in scan.components.iter().zip(windows.iter_mut()) {
        let (window, blocks_per_row) = slot
            .as_mut()
            .ok_or(Error::InvalidScanComponent(sc.index))?;
        let start_col = col * sc.mcu_width;
        for row in window
            .chunks_exact_mut(*blocks_per_row)
            .skip(yoffset)
            .take(sc.mcu_height)
        {
            let blocks = &mut row[start_col..start_col + sc.mcu_width];
            let buffered = &mut mcu[blkn..blkn + sc.mcu_width];
            match direction {
                McuCopy::Gather => buffered.copy_from_slice(blocks),
                McuCopy::Scatter => blocks.copy_from_slice(buffered),
            }
            blkn += sc.mcu_width;
        }
    }
    Ok(blkn)
}

#[cfg(feature = "multiscan")]
fn full_image_store(frame: &FrameInfo, options: &DecompressOptions) -> Result<Store> {
    use crate::{mem::realize_block_arrays, util::round_up};

    // Smoothing looks at the iMCU rows above and below the one being output.
    let access_factor = if cfg!(feature = "smoothing") && frame.progressive {
        3
    } else {
        1
    };
    let mut arrays: Vec<BlockArray> = frame
        .components
        .iter()
        .map(|c| {
            BlockArray::request(
                round_up(c.width_in_blocks, c.h_samp_factor),
                round_up(c.height_in_blocks, c.v_samp_factor),
                c.v_samp_factor * access_factor,
                true,
            )
        })
        .collect();
    realize_block_arrays(&mut arrays, options.max_memory_bytes, &options.backing_store)?;
    Ok(Store::FullImage { arrays })
}

#[cfg(not(feature = "multiscan"))]
fn full_image_store(_frame: &FrameInfo, _options: &DecompressOptions) -> Result<Store> {
    Err(Error::NotCompiled("multi-scan decoding"))
}

#[cfg(test)]
mod test;
