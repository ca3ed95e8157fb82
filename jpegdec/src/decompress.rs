// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The top-level decode state machine.
//!
//! A [`Decompressor`] is driven by repeated calls; every call that runs out of input returns
//! [`ProcessingResult::NeedsMoreInput`] and can be repeated unchanged once the source has more
//! data.
//!
//! Single-scan images are decoded row by row straight to samples. Multi-scan images are
//! gathered in whole-image coefficient arrays first, and either read completely before any
//! output (the default), or shown pass by pass in buffered-image mode:
//!
//! ```text
//! read_header -> start_decompress
//!   loop { consume_input*; start_output(n); read_imcu_row* | decode_planes; finish_output }
//! finish_decompress
//! ```

use crate::{
    coef::{CoefController, DecodeStatus, Producer},
    entropy::{ScanEvent, ScanSource},
    error::{Error, Result},
    headers::{FrameHeader, FrameInfo, ScanHeader},
    idct::Idct,
    image::Plane,
    input::{DecodeContext, InputStatus, consume_input, start_input_pass},
    mem::BlockArray,
    options::DecompressOptions,
    util::tracing_wrappers::*,
};

#[derive(Debug)]
pub enum ProcessingResult<T> {
    Complete { result: T },
    NeedsMoreInput,
}

impl<T> ProcessingResult<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, ProcessingResult::Complete { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DecoderState {
    Start,
    HeaderRead,
    /// Absorbing a multi-scan image before its only output pass.
    Preload,
    /// Output pass in progress, outside buffered-image mode.
    Scanning,
    /// Buffered-image mode, between output passes.
    BufferedImage,
    BufferedOutput,
    /// Buffered-image mode, waiting for the input to move past the scan just shown.
    BufferedPost,
    /// Reading coefficients only, with no output passes.
    ReadingCoefficients,
    Stopping,
    Done,
}

impl DecoderState {
    fn name(self) -> &'static str {
        match self {
            DecoderState::Start => "start",
            DecoderState::HeaderRead => "header read",
            DecoderState::Preload => "preload",
            DecoderState::Scanning => "scanning",
            DecoderState::BufferedImage => "buffered image",
            DecoderState::BufferedOutput => "buffered output",
            DecoderState::BufferedPost => "buffered post",
            DecoderState::ReadingCoefficients => "reading coefficients",
            DecoderState::Stopping => "stopping",
            DecoderState::Done => "done",
        }
    }
}

/// Partial planes of a [`Decompressor::decode_planes`] call that ran out of input.
#[derive(Debug, Default)]
struct PlaneAssembly {
    row_buffers: Vec<Plane>,
    planes: Vec<Plane>,
}

pub struct Decompressor<S: ScanSource> {
    source: S,
    options: DecompressOptions,
    state: DecoderState,
    ctx: DecodeContext,
    first_scan: Option<ScanHeader>,
    coef: Option<CoefController>,
    idct: Idct,
    assembly: Option<PlaneAssembly>,
}

impl<S: ScanSource> Decompressor<S> {
    pub fn new(header: &FrameHeader, options: DecompressOptions, source: S) -> Result<Self> {
        let frame = FrameInfo::new(header)?;
        let idct = Idct::new(options.dct_method, frame.num_components(), options.parallel);
        Ok(Self {
            source,
            options,
            state: DecoderState::Start,
            ctx: DecodeContext::new(frame),
            first_scan: None,
            coef: None,
            idct,
            assembly: None,
        })
    }

    fn bad_state(&self) -> Error {
        Error::InvalidState(self.state.name())
    }

    pub fn frame(&self) -> &FrameInfo {
        &self.ctx.frame
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Gives access to the source, typically to push more input into it.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Skips the inverse DCT of a component whose samples are not wanted. Its output planes are
    /// left untouched. Only allowed before [`Self::start_decompress`].
    pub fn set_component_needed(&mut self, component: usize, needed: bool) -> Result<()> {
        if !matches!(self.state, DecoderState::Start | DecoderState::HeaderRead) {
            return Err(self.bad_state());
        }
        let comp = self
            .ctx
            .frame
            .components
            .get_mut(component)
            .ok_or(Error::InvalidComponent(component))?;
        comp.component_needed = needed;
        Ok(())
    }

    pub fn has_multiple_scans(&self) -> bool {
        self.ctx.has_multiple_scans
    }

    /// Reads up to the first scan.
    pub fn read_header(&mut self) -> Result<ProcessingResult<()>> {
        match self.state {
            DecoderState::Start => {}
            DecoderState::HeaderRead => return Ok(ProcessingResult::Complete { result: () }),
            _ => return Err(self.bad_state()),
        }
        match self.source.next_scan()? {
            ScanEvent::NeedsMoreInput => Ok(ProcessingResult::NeedsMoreInput),
            ScanEvent::EndOfImage => Err(Error::NoScans),
            ScanEvent::Scan(header) => {
                self.ctx.note_first_scan(&header);
                self.first_scan = Some(header);
                self.state = DecoderState::HeaderRead;
                Ok(ProcessingResult::Complete { result: () })
            }
        }
    }

    /// Sets up the coefficient controller and starts reading the first scan.
    fn master_selection(&mut self, need_full_buffer: bool) -> Result<()> {
        let first_scan = self
            .first_scan
            .take()
            .ok_or(Error::InvalidState("no scan header"))?;
        let mut coef = CoefController::new(&self.ctx.frame, need_full_buffer, &self.options)?;
        start_input_pass(&mut coef, &mut self.ctx, &mut self.source, &first_scan)?;
        self.coef = Some(coef);
        Ok(())
    }

    fn output_pass_setup(&mut self) -> Result<()> {
        let coef = self
            .coef
            .as_mut()
            .ok_or(Error::InvalidState("no coefficient controller"))?;
        self.idct.start_pass(&self.ctx.frame);
        coef.start_output_pass(&mut self.ctx, self.options.block_smoothing);
        self.assembly = None;
        Ok(())
    }

    /// Prepares for output. For a multi-scan image outside buffered-image mode this reads the
    /// whole input first.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), err))]
    pub fn start_decompress(&mut self) -> Result<ProcessingResult<()>> {
        if self.state == DecoderState::HeaderRead {
            let need_full_buffer = self.options.buffered_image || self.ctx.has_multiple_scans;
            self.master_selection(need_full_buffer)?;
            if self.options.buffered_image {
                self.state = DecoderState::BufferedImage;
                return Ok(ProcessingResult::Complete { result: () });
            }
            self.state = DecoderState::Preload;
        }
        if self.state != DecoderState::Preload {
            return Err(self.bad_state());
        }
        if self.ctx.has_multiple_scans {
            let coef = self
                .coef
                .as_mut()
                .ok_or(Error::InvalidState("no coefficient controller"))?;
            loop {
                match consume_input(coef, &mut self.ctx, &mut self.source)? {
                    InputStatus::Suspended => return Ok(ProcessingResult::NeedsMoreInput),
                    InputStatus::ReachedEoi => break,
                    _ => {}
                }
            }
        }
        self.ctx.output_scan_number = self.ctx.input_scan_number;
        self.output_pass_setup()?;
        self.state = DecoderState::Scanning;
        Ok(ProcessingResult::Complete { result: () })
    }

    pub fn output_complete(&self) -> bool {
        self.ctx.output_imcu_row >= self.ctx.frame.total_imcu_rows
    }

    /// One buffer per component, sized for one iMCU row of samples.
    pub fn allocate_imcu_row_buffers(&self) -> Result<Vec<Plane>> {
        (0..self.ctx.frame.num_components())
            .map(|c| Plane::new(self.ctx.frame.imcu_row_buffer_size(c)))
            .collect()
    }

    /// Produces the next iMCU row of samples into `output` (see
    /// [`Self::allocate_imcu_row_buffers`]) and returns its index.
    pub fn read_imcu_row(&mut self, output: &mut [Plane]) -> Result<ProcessingResult<usize>> {
        if !matches!(
            self.state,
            DecoderState::Scanning | DecoderState::BufferedOutput
        ) {
            return Err(self.bad_state());
        }
        let coef = self
            .coef
            .as_mut()
            .ok_or(Error::InvalidState("no coefficient controller"))?;
        let status = coef.decompress_data(&mut self.ctx, &mut self.source, &self.idct, output)?;
        Ok(match status {
            DecodeStatus::Suspended => ProcessingResult::NeedsMoreInput,
            DecodeStatus::RowCompleted | DecodeStatus::ScanCompleted => {
                ProcessingResult::Complete {
                    result: self.ctx.output_imcu_row - 1,
                }
            }
        })
    }

    /// Runs the rest of the current output pass and returns whole planes, one per component,
    /// each `downsampled_width` x `downsampled_height`.
    pub fn decode_planes(&mut self) -> Result<ProcessingResult<Vec<Plane>>> {
        let mut assembly = match self.assembly.take() {
            Some(assembly) => assembly,
            None => PlaneAssembly {
                row_buffers: self.allocate_imcu_row_buffers()?,
                planes: self
                    .ctx
                    .frame
                    .components
                    .iter()
                    .map(|c| Plane::new((c.downsampled_width, c.downsampled_height)))
                    .collect::<Result<_>>()?,
            },
        };

        while !self.output_complete() {
            let row = match self.read_imcu_row(&mut assembly.row_buffers)? {
                ProcessingResult::Complete { result } => result,
                ProcessingResult::NeedsMoreInput => {
                    self.assembly = Some(assembly);
                    return Ok(ProcessingResult::NeedsMoreInput);
                }
            };
            for (c, comp) in self.ctx.frame.components.iter().enumerate() {
                if !comp.component_needed {
                    continue;
                }
                let rows_per_imcu_row = self.ctx.frame.imcu_row_buffer_size(c).1;
                let y = row * rows_per_imcu_row;
                let height = rows_per_imcu_row.min(comp.downsampled_height - y);
                assembly.planes[c].copy_from(
                    &assembly.row_buffers[c],
                    (comp.downsampled_width, height),
                    (0, y),
                )?;
            }
        }
        Ok(ProcessingResult::Complete {
            result: assembly.planes,
        })
    }

    /// Absorbs input without producing output, in buffered-image mode.
    pub fn consume_input(&mut self) -> Result<InputStatus> {
        if !matches!(
            self.state,
            DecoderState::BufferedImage
                | DecoderState::BufferedOutput
                | DecoderState::BufferedPost
                | DecoderState::Scanning
                | DecoderState::Stopping
        ) {
            return Err(self.bad_state());
        }
        let coef = self
            .coef
            .as_mut()
            .ok_or(Error::InvalidState("no coefficient controller"))?;
        consume_input(coef, &mut self.ctx, &mut self.source)
    }

    pub fn input_complete(&self) -> bool {
        self.ctx.eoi_reached
    }

    pub fn input_scan_number(&self) -> usize {
        self.ctx.input_scan_number
    }

    pub fn output_scan_number(&self) -> usize {
        self.ctx.output_scan_number
    }

    /// Which producer the current output pass uses.
    pub fn output_producer(&self) -> Option<Producer> {
        self.coef.as_ref().map(CoefController::producer)
    }

    /// Starts an output pass showing the image as of the end of scan `scan_number`.
    pub fn start_output(&mut self, scan_number: usize) -> Result<()> {
        if self.state != DecoderState::BufferedImage {
            return Err(self.bad_state());
        }
        let mut scan_number = scan_number.max(1);
        if self.ctx.eoi_reached && scan_number > self.ctx.input_scan_number {
            scan_number = self.ctx.input_scan_number;
        }
        debug!("output pass for scan {scan_number}");
        self.ctx.output_scan_number = scan_number;
        self.output_pass_setup()?;
        self.state = DecoderState::BufferedOutput;
        Ok(())
    }

    /// Ends an output pass, then reads input until it has moved past the scan just shown.
    pub fn finish_output(&mut self) -> Result<ProcessingResult<()>> {
        match self.state {
            DecoderState::BufferedOutput => self.state = DecoderState::BufferedPost,
            DecoderState::BufferedPost => {}
            _ => return Err(self.bad_state()),
        }
        self.assembly = None;
        let coef = self
            .coef
            .as_mut()
            .ok_or(Error::InvalidState("no coefficient controller"))?;
        while self.ctx.input_scan_number <= self.ctx.output_scan_number && !self.ctx.eoi_reached {
            if consume_input(coef, &mut self.ctx, &mut self.source)? == InputStatus::Suspended {
                return Ok(ProcessingResult::NeedsMoreInput);
            }
        }
        self.state = DecoderState::BufferedImage;
        Ok(ProcessingResult::Complete { result: () })
    }

    /// Reads every scan into the coefficient arrays without producing samples.
    pub fn read_coefficients(&mut self) -> Result<ProcessingResult<()>> {
        match self.state {
            DecoderState::HeaderRead => {
                self.master_selection(true)?;
                self.state = DecoderState::ReadingCoefficients;
            }
            DecoderState::ReadingCoefficients => {}
            DecoderState::Stopping => return Ok(ProcessingResult::Complete { result: () }),
            _ => return Err(self.bad_state()),
        }
        let coef = self
            .coef
            .as_mut()
            .ok_or(Error::InvalidState("no coefficient controller"))?;
        loop {
            match consume_input(coef, &mut self.ctx, &mut self.source)? {
                InputStatus::Suspended => return Ok(ProcessingResult::NeedsMoreInput),
                InputStatus::ReachedEoi => break,
                _ => {}
            }
        }
        self.state = DecoderState::Stopping;
        Ok(ProcessingResult::Complete { result: () })
    }

    /// The whole-image coefficient arrays, one per component, when the decode keeps them.
    pub fn coefficient_arrays(&mut self) -> Option<&mut [BlockArray]> {
        self.coef.as_mut()?.coefficient_arrays()
    }

    /// Reads the rest of the input up to the end of the image.
    pub fn finish_decompress(&mut self) -> Result<ProcessingResult<()>> {
        match self.state {
            DecoderState::Scanning => {
                if !self.output_complete() {
                    return Err(Error::TooLittleData(
                        self.ctx.frame.total_imcu_rows - self.ctx.output_imcu_row,
                    ));
                }
                self.state = DecoderState::Stopping;
            }
            DecoderState::BufferedImage => self.state = DecoderState::Stopping,
            DecoderState::Stopping => {}
            DecoderState::Done => return Ok(ProcessingResult::Complete { result: () }),
            _ => return Err(self.bad_state()),
        }
        let coef = self
            .coef
            .as_mut()
            .ok_or(Error::InvalidState("no coefficient controller"))?;
        while !self.ctx.eoi_reached {
            if consume_input(coef, &mut self.ctx, &mut self.source)? == InputStatus::Suspended {
                return Ok(ProcessingResult::NeedsMoreInput);
            }
        }
        debug!("decompression finished");
        self.state = DecoderState::Done;
        Ok(ProcessingResult::Complete { result: () })
    }
}
