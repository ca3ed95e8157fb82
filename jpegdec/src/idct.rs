// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use jpegdec_transforms::{Multipliers, inverse_dct};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    BLOCK_DIM, BLOCK_SIZE, DctMethod, block::Block, headers::FrameInfo, image::Plane,
    util::tracing_wrappers::*,
};

/// Per-component inverse DCT state: the multiplier tables of the current output pass.
#[derive(Debug)]
pub struct Idct {
    method: DctMethod,
    multipliers: Vec<Multipliers>,
    parallel: bool,
}

impl Idct {
    /// Components start with all-zero tables, so they decode to flat grey until a
    /// quantization table is known for them.
    pub fn new(method: DctMethod, num_components: usize, parallel: bool) -> Self {
        Self {
            method,
            multipliers: vec![Multipliers::zeroed(method); num_components],
            parallel: parallel && cfg!(feature = "parallel"),
        }
    }

    /// Rebuilds the tables from the quantization tables latched so far.
    pub fn start_pass(&mut self, frame: &FrameInfo) {
        for (comp, multipliers) in frame.components.iter().zip(self.multipliers.iter_mut()) {
            if !comp.component_needed {
                continue;
            }
            // Keep the previous table if none was latched yet.
            if let Some(table) = comp.quant_table.as_ref() {
                *multipliers = Multipliers::new(self.method, table.values());
            }
        }
        trace!("idct pass with {:?}", self.method);
    }

    /// Transforms one block into the 8x8 samples of `plane` whose top-left corner is `(x, y)`.
    pub fn transform_block(&self, component: usize, block: &Block, plane: &mut Plane, x: usize, y: usize) {
        let (output, stride) = plane.block_mut(x, y);
        inverse_dct(block, &self.multipliers[component], output, stride);
    }

    /// Transforms a row of blocks into sample rows `y..y + 8` of `plane`, starting at
    /// column 0.
    pub fn transform_block_row(&self, component: usize, blocks: &[Block], plane: &mut Plane, y: usize) {
        let multipliers = &self.multipliers[component];
        let stride = plane.size().0;
        debug_assert!(blocks.len() * BLOCK_DIM <= stride);
        let rows = plane.block_row_mut(y);

        #[cfg(feature = "parallel")]
        if self.parallel {
            let samples: Vec<[u8; BLOCK_SIZE]> = blocks
                .par_iter()
                .map(|block| {
                    let mut out = [0u8; BLOCK_SIZE];
                    inverse_dct(block, multipliers, &mut out, BLOCK_DIM);
                    out
                })
                .collect();
            for (bx, out) in samples.iter().enumerate() {
                for (dy, src) in out.chunks_exact(BLOCK_DIM).enumerate() {
                    let start = dy * stride + bx * BLOCK_DIM;
                    rows[start..start + BLOCK_DIM].copy_from_slice(src);
                }
            }
            return;
        }

        for (bx, block) in blocks.iter().enumerate() {
            inverse_dct(block, multipliers, &mut rows[bx * BLOCK_DIM..], stride);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        block::QuantTable,
        error::Result,
        headers::{ComponentSpec, FrameHeader},
    };
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use test_log::test;

    fn frame() -> Result<FrameInfo> {
        FrameInfo::new(&FrameHeader {
            width: 40,
            height: 8,
            progressive: false,
            components: vec![ComponentSpec::new(1, 1, 1, 0), ComponentSpec::new(2, 1, 1, 1)],
        })
    }

    #[test]
    fn missing_table_gives_grey() -> Result<()> {
        let mut frame = frame()?;
        frame.components[0].quant_table = Some(QuantTable::new([1; BLOCK_SIZE]));
        let mut idct = Idct::new(DctMethod::IntegerSlow, 2, false);
        idct.start_pass(&frame);

        let mut block = [0i16; BLOCK_SIZE];
        block[0] = 80;
        let mut plane = Plane::new((40, 8))?;
        idct.transform_block(0, &block, &mut plane, 8, 0);
        idct.transform_block(1, &block, &mut plane, 16, 0);
        assert_eq!(plane.row(3)[8..16], [138; 8]);
        assert_eq!(plane.row(3)[16..24], [128; 8]);
        assert_eq!(plane.row(3)[0..8], [0; 8]);
        Ok(())
    }

    #[test]
    fn row_matches_single_blocks() -> Result<()> {
        let mut frame = frame()?;
        let mut rng = XorShiftRng::seed_from_u64(0);
        frame.components[0].quant_table =
            Some(QuantTable::new(std::array::from_fn(|_| rng.random_range(1..20))));
        let blocks: Vec<Block> = (0..5)
            .map(|_| std::array::from_fn(|i| if i < 10 { rng.random_range(-30..30) } else { 0 }))
            .collect();

        for method in [DctMethod::IntegerSlow, DctMethod::IntegerFast, DctMethod::Float] {
            let mut expected = Plane::new((40, 16))?;
            let mut idct = Idct::new(method, 2, false);
            idct.start_pass(&frame);
            for (bx, block) in blocks.iter().enumerate() {
                idct.transform_block(0, block, &mut expected, bx * BLOCK_DIM, 8);
            }
            for parallel in [false, true] {
                let mut idct = Idct::new(method, 2, parallel);
                idct.start_pass(&frame);
                let mut plane = Plane::new((40, 16))?;
                idct.transform_block_row(0, &blocks, &mut plane, 8);
                assert_eq!(plane, expected, "{method:?} parallel={parallel}");
            }
        }
        Ok(())
    }
}
