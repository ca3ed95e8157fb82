// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Resumable JPEG coefficient decoding.
//!
//! The crate sits between an entropy decoder, which produces one MCU of coefficient blocks
//! at a time and may run out of input at any point, and the inverse DCT. It sequences
//! single-pass (baseline) decoding, buffers whole-image coefficient arrays for multi-scan
//! and progressive images, and can smooth not-yet-refined progressive output.
//!
//! The usual entry point is [`decompress::Decompressor`].

#![deny(unsafe_code)]
pub mod block;
pub mod coef;
pub mod decompress;
pub mod entropy;
pub mod error;
pub mod headers;
pub mod idct;
pub mod image;
pub mod input;
pub mod mem;
pub mod options;
pub mod precision;
pub mod raw;
pub mod util;

pub use jpegdec_transforms::{BLOCK_DIM, BLOCK_SIZE, DctMethod};

/// Maximum number of components in a frame.
pub const MAX_COMPONENTS: usize = 10;
/// Maximum number of components in one scan.
pub const MAX_COMPS_IN_SCAN: usize = 4;
/// Maximum number of blocks in one MCU.
pub const MAX_BLOCKS_IN_MCU: usize = 10;
pub const MAX_SAMP_FACTOR: usize = 4;
/// Largest accepted image dimension, in samples.
pub const MAX_DIMENSION: usize = 65500;
