// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::{
    BLOCK_DIM,
    error::{Error, Result},
    util::tracing_wrappers::*,
};

/// An owned plane of 8-bit samples.
#[derive(Clone, PartialEq, Eq)]
pub struct Plane {
    size: (usize, usize),
    data: Vec<u8>,
}

impl Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Plane {}x{}", self.size.0, self.size.1)
    }
}

impl Plane {
    #[cfg_attr(feature = "tracing", instrument(err))]
    pub fn new(size: (usize, usize)) -> Result<Plane> {
        let (xsize, ysize) = size;
        if xsize == 0 || ysize == 0 {
            return Err(Error::InvalidImageSize(xsize, ysize));
        }
        let total_size = xsize
            .checked_mul(ysize)
            .ok_or(Error::ImageSizeTooLarge(xsize, ysize))?;
        trace!("allocating {xsize}x{ysize} plane");
        let mut data = vec![];
        data.try_reserve_exact(total_size)?;
        data.resize(total_size, 0);
        Ok(Plane { size, data })
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn row(&self, row: usize) -> &[u8] {
        debug_assert!(row < self.size.1);
        let start = row * self.size.0;
        &self.data[start..start + self.size.0]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        debug_assert!(row < self.size.1);
        let start = row * self.size.0;
        &mut self.data[start..start + self.size.0]
    }

    /// Samples covered by the 8x8 block whose top-left corner is at `(x, y)`, plus the row
    /// stride to use when writing them.
    pub fn block_mut(&mut self, x: usize, y: usize) -> (&mut [u8], usize) {
        debug_assert!(x + BLOCK_DIM <= self.size.0 && y + BLOCK_DIM <= self.size.1);
        let stride = self.size.0;
        let start = y * stride + x;
        let end = start + (BLOCK_DIM - 1) * stride + BLOCK_DIM;
        (&mut self.data[start..end], stride)
    }

    /// Rows `y..y + BLOCK_DIM` as one slice, for transforming a whole block row at once.
    pub fn block_row_mut(&mut self, y: usize) -> &mut [u8] {
        debug_assert!(y + BLOCK_DIM <= self.size.1);
        let start = y * self.size.0;
        &mut self.data[start..start + BLOCK_DIM * self.size.0]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Copies the top-left `size` samples of `src` to position `origin` in `self`.
    pub fn copy_from(
        &mut self,
        src: &Plane,
        size: (usize, usize),
        origin: (usize, usize),
    ) -> Result<()> {
        let fits = |o: usize, s: usize, limit: usize| o.checked_add(s).is_some_and(|e| e <= limit);
        if size.0 > src.size.0
            || size.1 > src.size.1
            || !fits(origin.0, size.0, self.size.0)
            || !fits(origin.1, size.1, self.size.1)
        {
            return Err(Error::OutputBufferMismatch(
                0, self.size.0, self.size.1, size.0, size.1,
            ));
        }
        for y in 0..size.1 {
            let dst = &mut self.row_mut(origin.1 + y)[origin.0..origin.0 + size.0];
            dst.copy_from_slice(&src.row(y)[..size.0]);
        }
        Ok(())
    }
}
