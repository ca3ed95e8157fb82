// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use test_log::test;

use super::{smooth::SMOOTHED_POS, *};
use crate::{
    DctMethod,
    block::QuantTable,
    entropy::{EntropyDecoder, ScanEvent},
    headers::{FrameHeader, ScanHeader},
    input::start_input_pass,
    raw::RawStreamSource,
    util::test::{
        CountingSource, flat_quant_table, frame_header, progressive_script, ramp_quant_table,
        random_coefficients, raw_source,
    },
};

/// A controller and context with the first scan of `source` started.
struct Harness {
    ctx: DecodeContext,
    coef: CoefController,
    idct: Idct,
    source: CountingSource<RawStreamSource>,
}

impl Harness {
    fn new(
        header: &FrameHeader,
        source: RawStreamSource,
        suspend_at: &[usize],
        need_full_buffer: bool,
    ) -> Result<Self> {
        let mut ctx = DecodeContext::new(FrameInfo::new(header)?);
        let mut source = CountingSource::new(source, suspend_at);
        let ScanEvent::Scan(first) = source.next_scan()? else {
            panic!("source has no scans");
        };
        ctx.note_first_scan(&first);
        let mut coef =
            CoefController::new(&ctx.frame, need_full_buffer, &DecompressOptions::default())?;
        start_input_pass(&mut coef, &mut ctx, &mut source, &first)?;
        let idct = Idct::new(DctMethod::IntegerSlow, ctx.frame.num_components(), false);
        Ok(Self {
            ctx,
            coef,
            idct,
            source,
        })
    }

    fn start_output(&mut self, scan_number: usize, block_smoothing: bool) {
        self.ctx.output_scan_number = scan_number;
        self.idct.start_pass(&self.ctx.frame);
        self.coef.start_output_pass(&mut self.ctx, block_smoothing);
    }

    fn output_buffers(&self) -> Result<Vec<Plane>> {
        (0..self.ctx.frame.num_components())
            .map(|c| Plane::new(self.ctx.frame.imcu_row_buffer_size(c)))
            .collect()
    }

    fn decompress_row(&mut self, output: &mut [Plane]) -> Result<DecodeStatus> {
        self.coef
            .decompress_data(&mut self.ctx, &mut self.source, &self.idct, output)
    }

    /// Every iMCU row of one output pass, retrying suspensions.
    fn output_pass(&mut self) -> Result<Vec<Vec<Plane>>> {
        let mut rows = vec![];
        let mut output = self.output_buffers()?;
        while self.ctx.output_imcu_row < self.ctx.frame.total_imcu_rows {
            if self.decompress_row(&mut output)? != DecodeStatus::Suspended {
                rows.push(output.clone());
            }
        }
        Ok(rows)
    }
}

fn sequential_source(header: &FrameHeader, seed: u64) -> Result<RawStreamSource> {
    let frame = FrameInfo::new(header)?;
    let coefficients = random_coefficients(&frame, &mut XorShiftRng::seed_from_u64(seed));
    let all = (0..frame.num_components()).collect();
    raw_source(
        &frame,
        &coefficients,
        &[ScanHeader::sequential(all)],
        ramp_quant_table(),
    )
}

#[test]
fn suspended_mcu_resumes_in_place() -> Result<()> {
    // 5x3 blocks, one MCU per block.
    let header = frame_header(40, 24, &[(1, 1)], false);
    let mut reference = Harness::new(&header, sequential_source(&header, 1)?, &[], false)?;
    reference.start_output(1, false);
    let expected = reference.output_pass()?;

    let mut harness = Harness::new(&header, sequential_source(&header, 1)?, &[8], false)?;
    harness.start_output(1, false);
    let mut output = harness.output_buffers()?;
    assert_eq!(harness.decompress_row(&mut output)?, DecodeStatus::RowCompleted);
    assert_eq!(output, expected[0]);

    assert_eq!(harness.decompress_row(&mut output)?, DecodeStatus::Suspended);
    assert_eq!(harness.coef.mcu_ctr, 3);
    assert_eq!(harness.coef.mcu_vert_offset, 0);
    assert_eq!(harness.ctx.input_imcu_row, 1);
    assert_eq!(harness.ctx.output_imcu_row, 1);
    assert_eq!(harness.source.mcus, 8);

    assert_eq!(harness.decompress_row(&mut output)?, DecodeStatus::RowCompleted);
    assert_eq!(output, expected[1]);
    assert_eq!(harness.decompress_row(&mut output)?, DecodeStatus::ScanCompleted);
    assert_eq!(output, expected[2]);
    assert_eq!(harness.source.mcus, 15);
    assert!(!harness.ctx.in_scan());
    Ok(())
}

#[test]
fn single_and_multi_pass_agree() -> Result<()> {
    // 4:2:0 with a dummy MCU column and a partial last iMCU row.
    let header = frame_header(40, 40, &[(2, 2), (1, 1), (1, 1)], false);
    let mut single = Harness::new(&header, sequential_source(&header, 2)?, &[], false)?;
    single.start_output(1, false);
    let expected = single.output_pass()?;
    assert_eq!(expected.len(), 3);

    let mut multi = Harness::new(&header, sequential_source(&header, 2)?, &[4, 7], true)?;
    assert!(multi.coef.has_full_buffer());
    multi.start_output(1, true);
    // Smoothing is only for progressive images.
    assert_eq!(multi.coef.producer(), Producer::Buffered);
    assert_eq!(multi.output_pass()?, expected);
    Ok(())
}

#[test]
fn non_interleaved_rows_follow_component_height() -> Result<()> {
    // Luma has 5x5 blocks: two block rows per iMCU row, one in the last.
    let header = frame_header(40, 40, &[(2, 2), (1, 1)], false);
    let frame = FrameInfo::new(&header)?;
    let coefficients = random_coefficients(&frame, &mut XorShiftRng::seed_from_u64(3));
    let scans = [
        ScanHeader::sequential(vec![0]),
        ScanHeader::sequential(vec![1]),
    ];
    let source = raw_source(&frame, &coefficients, &scans, flat_quant_table(2))?;
    let mut harness = Harness::new(&header, source, &[], true)?;
    assert!(harness.ctx.has_multiple_scans);

    let mut mcus_per_row = vec![];
    loop {
        let before = harness.source.mcus;
        let status = consume_input(&mut harness.coef, &mut harness.ctx, &mut harness.source)?;
        mcus_per_row.push(harness.source.mcus - before);
        if status == InputStatus::ScanCompleted {
            break;
        }
        assert_eq!(status, InputStatus::RowCompleted);
    }
    assert_eq!(mcus_per_row, [10, 10, 5]);

    // Chroma: one block row per iMCU row, 3 blocks wide.
    assert_eq!(
        consume_input(&mut harness.coef, &mut harness.ctx, &mut harness.source)?,
        InputStatus::ReachedSos
    );
    let before = harness.source.mcus;
    while consume_input(&mut harness.coef, &mut harness.ctx, &mut harness.source)?
        != InputStatus::ScanCompleted
    {}
    assert_eq!(harness.source.mcus - before, 9);

    // The arrays hold the coefficients as written.
    let arrays = harness.coef.coefficient_arrays().expect("full buffer");
    let comp = &frame.components[1];
    let window = arrays[1].access(0, 1, false)?;
    assert_eq!(window[..comp.width_in_blocks], coefficients[1][..comp.width_in_blocks]);
    Ok(())
}

fn progressive_harness(quant: QuantTable) -> Result<Harness> {
    let header = frame_header(32, 32, &[(1, 1)], true);
    let frame = FrameInfo::new(&header)?;
    let coefficients = random_coefficients(&frame, &mut XorShiftRng::seed_from_u64(4));
    let source = raw_source(&frame, &coefficients, &progressive_script(1), quant)?;
    Harness::new(&header, source, &[], true)
}

#[test]
fn smoothing_chosen_per_output_pass() -> Result<()> {
    let mut harness = progressive_harness(flat_quant_table(3))?;
    harness.start_output(1, true);
    assert_eq!(harness.coef.producer(), Producer::Smoothing);
    let rows = harness.output_pass()?;
    assert_eq!(rows.len(), 4);

    // Without the option, or once every coefficient is complete, the plain producer is used.
    harness.start_output(1, false);
    assert_eq!(harness.coef.producer(), Producer::Buffered);
    while consume_input(&mut harness.coef, &mut harness.ctx, &mut harness.source)?
        != InputStatus::ReachedEoi
    {}
    harness.start_output(harness.ctx.input_scan_number, true);
    assert_eq!(harness.coef.producer(), Producer::Buffered);
    Ok(())
}

#[test]
fn smoothing_needs_nonzero_quantizers() -> Result<()> {
    for pos in SMOOTHED_POS {
        let mut values = [3; BLOCK_SIZE];
        values[pos] = 0;
        let mut harness = progressive_harness(QuantTable::new(values))?;
        harness.start_output(1, true);
        assert_eq!(harness.coef.producer(), Producer::Buffered, "zero at {pos}");
    }

    // Quantizers of coefficients that are never estimated do not matter.
    let mut values = [3; BLOCK_SIZE];
    values[BLOCK_SIZE - 1] = 0;
    let mut harness = progressive_harness(QuantTable::new(values))?;
    harness.start_output(1, true);
    assert_eq!(harness.coef.producer(), Producer::Smoothing);
    Ok(())
}

#[test]
fn dc_scan_smoothing_stays_a_row_behind() -> Result<()> {
    // Reference: the whole DC scan is in before output starts.
    let mut reference = progressive_harness(flat_quant_table(3))?;
    while consume_input(&mut reference.coef, &mut reference.ctx, &mut reference.source)?
        != InputStatus::ScanCompleted
    {}
    reference.start_output(1, true);
    assert_eq!(reference.coef.producer(), Producer::Smoothing);
    let expected = reference.output_pass()?;
    assert_eq!(expected.len(), 4);

    let mut harness = progressive_harness(flat_quant_table(3))?;
    assert!(harness.ctx.in_scan());
    harness.start_output(1, true);
    assert_eq!(harness.coef.producer(), Producer::Smoothing);
    let mut output = harness.output_buffers()?;
    assert_eq!(harness.decompress_row(&mut output)?, DecodeStatus::RowCompleted);
    // The DC values of the row below were read before the first row was shown.
    assert_eq!(harness.ctx.input_imcu_row, 2);
    assert_eq!(harness.ctx.input_scan_number, 1);
    assert_eq!(output, expected[0]);

    let mut rows = vec![output];
    rows.extend(harness.output_pass()?);
    assert_eq!(rows, expected);
    Ok(())
}

fn dc_only_block(dc: i16) -> Block {
    let mut block = [0; BLOCK_SIZE];
    block[0] = dc;
    block
}

#[test]
fn smoothing_replicates_edge_blocks() -> Result<()> {
    // 2x2 blocks, one block row per iMCU row:
    //    40  -40
    //   -20   60
    let header = frame_header(16, 16, &[(1, 1)], true);
    let frame = FrameInfo::new(&header)?;
    let coefficients = vec![[40, -40, -20, 60].map(dc_only_block).to_vec()];
    let source = raw_source(
        &frame,
        &coefficients,
        &progressive_script(1),
        flat_quant_table(3),
    )?;
    let mut harness = Harness::new(&header, source, &[], true)?;
    while consume_input(&mut harness.coef, &mut harness.ctx, &mut harness.source)?
        != InputStatus::ScanCompleted
    {}
    harness.start_output(1, true);
    assert_eq!(harness.coef.producer(), Producer::Smoothing);
    let rows = harness.output_pass()?;
    assert_eq!(rows.len(), 2);

    // Estimates at natural positions 1, 8, 16, 9 and 2, with the missing neighbours outside
    // the image taken from the nearest block. No AC bits are known, so nothing is clamped.
    let estimates = [
        [[11, 8, -2, 3, -3], [11, -14, 4, 3, 3]],
        [[-11, 8, 2, 3, 3], [-11, -14, -4, 3, -3]],
    ];
    for (r, row_estimates) in estimates.iter().enumerate() {
        let mut expected = harness.output_buffers()?;
        for (col, values) in row_estimates.iter().enumerate() {
            let mut block = coefficients[0][r * 2 + col];
            for (&pos, &value) in SMOOTHED_POS[1..].iter().zip(values) {
                block[pos] = value;
            }
            harness
                .idct
                .transform_block(0, &block, &mut expected[0], col * BLOCK_DIM, 0);
        }
        assert_eq!(rows[r], expected, "iMCU row {r}");
    }
    Ok(())
}

/// Fills the MCU with garbage and reports missing input on every first attempt at an MCU.
struct ScribblingSource<'a> {
    inner: &'a mut dyn ScanSource,
    retry: bool,
    suspensions: usize,
}

impl EntropyDecoder for ScribblingSource<'_> {
    fn start_pass(&mut self, frame: &FrameInfo, scan: &ScanInfo) -> Result<()> {
        self.inner.entropy_decoder().start_pass(frame, scan)
    }

    fn decode_mcu(&mut self, blocks: &mut [Block]) -> Result<McuStatus> {
        if !self.retry {
            self.retry = true;
            self.suspensions += 1;
            blocks.fill([99; BLOCK_SIZE]);
            return Ok(McuStatus::NeedsMoreInput);
        }
        self.retry = false;
        self.inner.entropy_decoder().decode_mcu(blocks)
    }
}

impl ScanSource for ScribblingSource<'_> {
    fn next_scan(&mut self) -> Result<ScanEvent> {
        self.inner.next_scan()
    }

    fn quant_table(&self, slot: usize) -> Option<&QuantTable> {
        self.inner.quant_table(slot)
    }

    fn entropy_decoder(&mut self) -> &mut dyn EntropyDecoder {
        self
    }
}

#[test]
fn suspended_mcu_leaves_arrays_untouched() -> Result<()> {
    // Interleaved DC scans and refinement scans, which build on what the arrays hold.
    let header = frame_header(32, 32, &[(2, 2), (1, 1)], true);
    let frame = FrameInfo::new(&header)?;
    let coefficients = random_coefficients(&frame, &mut XorShiftRng::seed_from_u64(6));
    let scans = progressive_script(2);
    let source = || raw_source(&frame, &coefficients, &scans, ramp_quant_table());

    let mut reference = Harness::new(&header, source()?, &[], true)?;
    while consume_input(&mut reference.coef, &mut reference.ctx, &mut reference.source)?
        != InputStatus::ReachedEoi
    {}
    reference.start_output(reference.ctx.input_scan_number, false);
    let expected = reference.output_pass()?;

    let mut harness = Harness::new(&header, source()?, &[], true)?;
    let mut scribbler = ScribblingSource {
        inner: &mut harness.source,
        retry: false,
        suspensions: 0,
    };
    while consume_input(&mut harness.coef, &mut harness.ctx, &mut scribbler)?
        != InputStatus::ReachedEoi
    {}
    assert!(scribbler.suspensions > 0);
    harness.start_output(harness.ctx.input_scan_number, false);
    assert_eq!(harness.output_pass()?, expected);
    Ok(())
}

#[test]
fn output_buffers_are_checked() -> Result<()> {
    let header = frame_header(16, 16, &[(1, 1), (1, 1)], false);
    let mut harness = Harness::new(&header, sequential_source(&header, 5)?, &[], false)?;
    harness.start_output(1, false);
    let mut output = harness.output_buffers()?;
    assert!(matches!(
        harness.decompress_row(&mut output[..1]),
        Err(Error::OutputBufferCount(2, 1))
    ));
    output[1] = Plane::new((8, 8))?;
    assert!(matches!(
        harness.decompress_row(&mut output),
        Err(Error::OutputBufferMismatch(1, 8, 8, 16, 8))
    ));
    Ok(())
}

#[cfg(not(feature = "multiscan"))]
#[test]
fn multiscan_not_compiled() -> Result<()> {
    let frame = FrameInfo::new(&frame_header(16, 16, &[(1, 1)], true))?;
    assert!(matches!(
        CoefController::new(&frame, true, &DecompressOptions::default()),
        Err(Error::NotCompiled(_))
    ));
    Ok(())
}
