// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::{MAX_BLOCKS_IN_MCU, MAX_COMPONENTS, MAX_COMPS_IN_SCAN, MAX_DIMENSION};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("Backing store I/O failed: {0}")]
    BackingStore(#[from] std::io::Error),
    #[error("Image size too large: {0}x{1}, max dimension is {MAX_DIMENSION}")]
    ImageSizeTooLarge(usize, usize),
    #[error("Invalid image size: {0}x{1}")]
    InvalidImageSize(usize, usize),
    #[error("Invalid number of components: {0}, max is {MAX_COMPONENTS}")]
    InvalidComponentCount(usize),
    #[error("Invalid sampling factors {1}x{2} for component {0}")]
    InvalidSamplingFactors(usize, usize, usize),
    #[error("Too many blocks in MCU: {0}, max is {MAX_BLOCKS_IN_MCU}")]
    McuTooLarge(usize),
    #[error("Invalid number of components in scan: {0}, max is {MAX_COMPS_IN_SCAN}")]
    InvalidScanComponentCount(usize),
    #[error("Invalid component index {0} in scan")]
    InvalidScanComponent(usize),
    #[error("Invalid component index {0}")]
    InvalidComponent(usize),
    #[error("Invalid progressive parameters Ss={0} Se={1} Ah={2} Al={3}")]
    InvalidProgression(u8, u8, u8, u8),
    #[error("Invalid block array access: rows {0}..{1} of {2}, at most {3} at a time")]
    InvalidBlockAccess(usize, usize, usize, usize),
    #[error("Block array rows {0}..{1} read or skipped before being written")]
    UndefinedBlockRows(usize, usize),
    #[error("Block array used before being realized")]
    UnrealizedBlockArray,
    #[error("{0} support was not compiled in")]
    NotCompiled(&'static str),
    #[error("Improper call in decoder state {0}")]
    InvalidState(&'static str),
    #[error("Extra scan in an image decoded with a single-MCU buffer")]
    UnexpectedScan,
    #[error("Image ended before its first scan")]
    NoScans,
    #[error("Quantization table {0} is not defined")]
    MissingQuantTable(usize),
    #[error("Output buffer for component {0} is {1}x{2}, expected {3}x{4}")]
    OutputBufferMismatch(usize, usize, usize, usize, usize),
    #[error("Expected {0} output buffers, got {1}")]
    OutputBufferCount(usize, usize),
    #[error("Coefficient grid for component {0} has {1} blocks, expected {2}")]
    CoefficientGridMismatch(usize, usize, usize),
    #[error("Finished decompression with {0} iMCU rows not yet output")]
    TooLittleData(usize),
    // Generic arithmetic overflow. Prefer using other errors if possible.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;
