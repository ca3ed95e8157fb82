// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Interfaces to the stages upstream of the coefficient controller.

use crate::{
    block::{Block, QuantTable},
    error::Result,
    headers::{FrameInfo, ScanHeader, ScanInfo},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum McuStatus {
    Complete,
    /// Not enough input for the whole MCU. Nothing was consumed and the call must be repeated
    /// with the same blocks once more data is available.
    NeedsMoreInput,
}

pub trait EntropyDecoder {
    /// Prepares for a new scan.
    fn start_pass(&mut self, frame: &FrameInfo, scan: &ScanInfo) -> Result<()>;

    /// Decodes one MCU into `blocks`, which are in MCU order: for each scan component, its
    /// blocks row by row.
    ///
    /// Coefficients not coded by the scan must be left untouched. In single-pass decoding the
    /// blocks arrive zeroed; in multi-scan decoding they hold what earlier scans produced.
    /// After [`McuStatus::NeedsMoreInput`] the contents of `blocks` are discarded.
    fn decode_mcu(&mut self, blocks: &mut [Block]) -> Result<McuStatus>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    /// A new scan starts; its data follows through [`ScanSource::entropy_decoder`].
    Scan(ScanHeader),
    EndOfImage,
    NeedsMoreInput,
}

/// The marker level of a stream: yields scans in order and owns the entropy decoder that reads
/// their data.
pub trait ScanSource {
    /// Advances to the next scan, or reports end of image. Only called between scans.
    fn next_scan(&mut self) -> Result<ScanEvent>;

    /// Quantization table currently stored in `slot`, if one was defined.
    fn quant_table(&self, slot: usize) -> Option<&QuantTable>;

    fn entropy_decoder(&mut self) -> &mut dyn EntropyDecoder;
}
