// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Frame and scan geometry.
//!
//! Marker parsing is left to the caller: it hands over a [`FrameHeader`] once and a
//! [`ScanHeader`] per scan, and this module derives the block and MCU layout from them.

use crate::{
    BLOCK_DIM, MAX_BLOCKS_IN_MCU, MAX_COMPONENTS, MAX_COMPS_IN_SCAN, MAX_DIMENSION,
    MAX_SAMP_FACTOR,
    block::QuantTable,
    error::{Error, Result},
    util::tracing_wrappers::*,
};

/// One component as declared in the frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSpec {
    pub id: u8,
    pub h_samp_factor: usize,
    pub v_samp_factor: usize,
    pub quant_table_slot: usize,
}

impl ComponentSpec {
    pub fn new(id: u8, h_samp_factor: usize, v_samp_factor: usize, quant_table_slot: usize) -> Self {
        Self {
            id,
            h_samp_factor,
            v_samp_factor,
            quant_table_slot,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: usize,
    pub height: usize,
    pub progressive: bool,
    pub components: Vec<ComponentSpec>,
}

/// Per-component geometry, fixed for the whole decode.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    pub index: usize,
    pub id: u8,
    pub h_samp_factor: usize,
    pub v_samp_factor: usize,
    pub quant_table_slot: usize,
    /// Width in blocks, not counting padding up to a whole MCU.
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
    /// Samples actually present, before any MCU padding.
    pub downsampled_width: usize,
    pub downsampled_height: usize,
    /// Whether output samples are wanted for this component.
    pub component_needed: bool,
    /// Quantization table saved when the component first appears in a scan.
    pub quant_table: Option<QuantTable>,
}

impl ComponentInfo {
    /// Number of block rows of this component in the given iMCU row.
    pub fn block_rows_in_imcu_row(&self, imcu_row: usize, total_imcu_rows: usize) -> usize {
        if imcu_row + 1 < total_imcu_rows {
            self.v_samp_factor
        } else {
            match self.height_in_blocks % self.v_samp_factor {
                0 => self.v_samp_factor,
                rows => rows,
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub width: usize,
    pub height: usize,
    pub progressive: bool,
    pub max_h_samp_factor: usize,
    pub max_v_samp_factor: usize,
    pub total_imcu_rows: usize,
    pub components: Vec<ComponentInfo>,
}

impl FrameInfo {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", err))]
    pub fn new(header: &FrameHeader) -> Result<FrameInfo> {
        let (width, height) = (header.width, header.height);
        if width == 0 || height == 0 {
            return Err(Error::InvalidImageSize(width, height));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Error::ImageSizeTooLarge(width, height));
        }
        let num_components = header.components.len();
        if num_components == 0 || num_components > MAX_COMPONENTS {
            return Err(Error::InvalidComponentCount(num_components));
        }

        let valid = 1..=MAX_SAMP_FACTOR;
        for (i, c) in header.components.iter().enumerate() {
            if !valid.contains(&c.h_samp_factor) || !valid.contains(&c.v_samp_factor) {
                return Err(Error::InvalidSamplingFactors(
                    i,
                    c.h_samp_factor,
                    c.v_samp_factor,
                ));
            }
        }
        let max_h_samp_factor = header
            .components
            .iter()
            .map(|c| c.h_samp_factor)
            .max()
            .unwrap_or(1);
        let max_v_samp_factor = header
            .components
            .iter()
            .map(|c| c.v_samp_factor)
            .max()
            .unwrap_or(1);

        let components = header
            .components
            .iter()
            .enumerate()
            .map(|(index, c)| {
                let downsampled_width = (width * c.h_samp_factor).div_ceil(max_h_samp_factor);
                let downsampled_height = (height * c.v_samp_factor).div_ceil(max_v_samp_factor);
                ComponentInfo {
                    index,
                    id: c.id,
                    h_samp_factor: c.h_samp_factor,
                    v_samp_factor: c.v_samp_factor,
                    quant_table_slot: c.quant_table_slot,
                    width_in_blocks: (width * c.h_samp_factor)
                        .div_ceil(max_h_samp_factor * BLOCK_DIM),
                    height_in_blocks: (height * c.v_samp_factor)
                        .div_ceil(max_v_samp_factor * BLOCK_DIM),
                    downsampled_width,
                    downsampled_height,
                    component_needed: true,
                    quant_table: None,
                }
            })
            .collect();

        let total_imcu_rows = height.div_ceil(max_v_samp_factor * BLOCK_DIM);
        debug!(
            "{width}x{height} frame, {num_components} components, max sampling \
             {max_h_samp_factor}x{max_v_samp_factor}, {total_imcu_rows} iMCU rows"
        );

        Ok(FrameInfo {
            width,
            height,
            progressive: header.progressive,
            max_h_samp_factor,
            max_v_samp_factor,
            total_imcu_rows,
            components,
        })
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Size of the per-component buffer that receives one iMCU row of samples.
    pub fn imcu_row_buffer_size(&self, component: usize) -> (usize, usize) {
        let c = &self.components[component];
        (c.width_in_blocks * BLOCK_DIM, c.v_samp_factor * BLOCK_DIM)
    }
}

/// Scan parameters as read from a start-of-scan segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanHeader {
    /// Frame component indices, in scan order.
    pub components: Vec<usize>,
    /// Spectral selection start and end, as zigzag indices.
    pub ss: u8,
    pub se: u8,
    /// Successive approximation bit positions (high and low).
    pub ah: u8,
    pub al: u8,
}

impl ScanHeader {
    /// A sequential scan covering all 64 coefficients of `components`.
    pub fn sequential(components: Vec<usize>) -> Self {
        Self {
            components,
            ss: 0,
            se: 63,
            ah: 0,
            al: 0,
        }
    }
}

/// MCU layout of one component within a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index into [`FrameInfo::components`].
    pub index: usize,
    /// Blocks per MCU, horizontally and vertically.
    pub mcu_width: usize,
    pub mcu_height: usize,
    pub mcu_blocks: usize,
    /// Width of one MCU in output samples.
    pub mcu_sample_width: usize,
    /// Non-dummy blocks in the last MCU column.
    pub last_col_width: usize,
    /// Non-dummy block rows in the last MCU row.
    pub last_row_height: usize,
}

#[derive(Clone, Debug)]
pub struct ScanInfo {
    pub components: Vec<ScanComponent>,
    pub mcus_per_row: usize,
    pub mcu_rows_in_scan: usize,
    pub blocks_in_mcu: usize,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl ScanInfo {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(frame), err))]
    pub fn new(frame: &FrameInfo, header: &ScanHeader) -> Result<ScanInfo> {
        let count = header.components.len();
        if count == 0 || count > MAX_COMPS_IN_SCAN {
            return Err(Error::InvalidScanComponentCount(count));
        }
        for (i, &c) in header.components.iter().enumerate() {
            if c >= frame.num_components() || header.components[..i].contains(&c) {
                return Err(Error::InvalidScanComponent(c));
            }
        }

        let (components, mcus_per_row, mcu_rows_in_scan) = if count == 1 {
            // Noninterleaved: one block per MCU, and an iMCU row spans v_samp_factor MCU rows.
            let comp = &frame.components[header.components[0]];
            let last_row_height = match comp.height_in_blocks % comp.v_samp_factor {
                0 => comp.v_samp_factor,
                rows => rows,
            };
            let sc = ScanComponent {
                index: comp.index,
                mcu_width: 1,
                mcu_height: 1,
                mcu_blocks: 1,
                mcu_sample_width: BLOCK_DIM,
                last_col_width: 1,
                last_row_height,
            };
            (vec![sc], comp.width_in_blocks, comp.height_in_blocks)
        } else {
            let mcus_per_row = frame
                .width
                .div_ceil(frame.max_h_samp_factor * BLOCK_DIM);
            let mcu_rows = frame
                .height
                .div_ceil(frame.max_v_samp_factor * BLOCK_DIM);
            let components = header
                .components
                .iter()
                .map(|&ci| {
                    let comp = &frame.components[ci];
                    let last_col_width = match comp.width_in_blocks % comp.h_samp_factor {
                        0 => comp.h_samp_factor,
                        cols => cols,
                    };
                    let last_row_height = match comp.height_in_blocks % comp.v_samp_factor {
                        0 => comp.v_samp_factor,
                        rows => rows,
                    };
                    ScanComponent {
                        index: ci,
                        mcu_width: comp.h_samp_factor,
                        mcu_height: comp.v_samp_factor,
                        mcu_blocks: comp.h_samp_factor * comp.v_samp_factor,
                        mcu_sample_width: comp.h_samp_factor * BLOCK_DIM,
                        last_col_width,
                        last_row_height,
                    }
                })
                .collect();
            (components, mcus_per_row, mcu_rows)
        };

        let blocks_in_mcu = components.iter().map(|c| c.mcu_blocks).sum();
        if blocks_in_mcu > MAX_BLOCKS_IN_MCU {
            return Err(Error::McuTooLarge(blocks_in_mcu));
        }

        Ok(ScanInfo {
            components,
            mcus_per_row,
            mcu_rows_in_scan,
            blocks_in_mcu,
            ss: header.ss,
            se: header.se,
            ah: header.ah,
            al: header.al,
        })
    }

    pub fn is_interleaved(&self) -> bool {
        self.components.len() > 1
    }

    pub fn is_dc_scan(&self) -> bool {
        self.ss == 0
    }

    /// Whether this scan carries every bit of every coefficient.
    pub fn is_sequential(&self) -> bool {
        self.ss == 0 && self.se == 63 && self.ah == 0 && self.al == 0
    }
}
