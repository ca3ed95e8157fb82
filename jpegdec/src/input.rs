// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Input side of a decode: walks the scans of the stream and feeds the coefficient controller.

use crate::{
    coef::{CoefController, DecodeStatus},
    entropy::{ScanEvent, ScanSource},
    error::{Error, Result},
    headers::{FrameInfo, ScanHeader, ScanInfo},
    precision::{CoefPrecision, validate_progression},
    util::tracing_wrappers::*,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputStatus {
    Suspended,
    ReachedSos,
    ReachedEoi,
    RowCompleted,
    ScanCompleted,
}

impl From<DecodeStatus> for InputStatus {
    fn from(status: DecodeStatus) -> Self {
        match status {
            DecodeStatus::RowCompleted => InputStatus::RowCompleted,
            DecodeStatus::ScanCompleted => InputStatus::ScanCompleted,
            DecodeStatus::Suspended => InputStatus::Suspended,
        }
    }
}

/// State shared by the input and output sides of one decode.
#[derive(Debug)]
pub struct DecodeContext {
    pub frame: FrameInfo,
    /// The scan being read, or the last one read once it is finished.
    pub scan: Option<ScanInfo>,
    in_scan: bool,
    /// Number of scans started so far; the first scan is 1.
    pub input_scan_number: usize,
    /// iMCU row the consumer works on next.
    pub input_imcu_row: usize,
    /// Scan whose data the current output pass shows.
    pub output_scan_number: usize,
    pub output_imcu_row: usize,
    pub eoi_reached: bool,
    pub has_multiple_scans: bool,
    /// Present for progressive images only.
    pub coef_bits: Option<CoefPrecision>,
}

impl DecodeContext {
    pub fn new(frame: FrameInfo) -> Self {
        let coef_bits = frame
            .progressive
            .then(|| CoefPrecision::new(frame.num_components()));
        Self {
            frame,
            scan: None,
            in_scan: false,
            input_scan_number: 0,
            input_imcu_row: 0,
            output_scan_number: 0,
            output_imcu_row: 0,
            eoi_reached: false,
            has_multiple_scans: false,
            coef_bits,
        }
    }

    pub fn in_scan(&self) -> bool {
        self.in_scan
    }

    /// Accounts for the first scan header, before the coefficient controller exists.
    pub fn note_first_scan(&mut self, header: &ScanHeader) {
        self.input_scan_number += 1;
        self.has_multiple_scans =
            self.frame.progressive || header.components.len() < self.frame.num_components();
        debug!(
            "first scan covers {} of {} components, multiple scans: {}",
            header.components.len(),
            self.frame.num_components(),
            self.has_multiple_scans
        );
    }
}

/// Makes one step of progress on the input: one iMCU row of scan data, or one scan boundary.
pub fn consume_input(
    coef: &mut CoefController,
    ctx: &mut DecodeContext,
    source: &mut dyn ScanSource,
) -> Result<InputStatus> {
    if ctx.eoi_reached {
        return Ok(InputStatus::ReachedEoi);
    }
    if ctx.in_scan {
        return Ok(coef.consume_data(ctx, source)?.into());
    }
    match source.next_scan()? {
        ScanEvent::NeedsMoreInput => Ok(InputStatus::Suspended),
        ScanEvent::EndOfImage => {
            debug!("end of image after {} scans", ctx.input_scan_number);
            ctx.eoi_reached = true;
            if ctx.output_scan_number > ctx.input_scan_number {
                ctx.output_scan_number = ctx.input_scan_number;
            }
            Ok(InputStatus::ReachedEoi)
        }
        ScanEvent::Scan(header) => {
            if !ctx.has_multiple_scans {
                return Err(Error::UnexpectedScan);
            }
            ctx.input_scan_number += 1;
            start_input_pass(coef, ctx, source, &header)?;
            Ok(InputStatus::ReachedSos)
        }
    }
}

/// Per-scan setup, then hands the scan data to the coefficient controller.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(coef, ctx, source), err)
)]
pub fn start_input_pass(
    coef: &mut CoefController,
    ctx: &mut DecodeContext,
    source: &mut dyn ScanSource,
    header: &ScanHeader,
) -> Result<()> {
    let scan = ScanInfo::new(&ctx.frame, header)?;
    match ctx.coef_bits.as_mut() {
        Some(coef_bits) => {
            validate_progression(&scan)?;
            coef_bits.start_scan(&scan);
        }
        None if !scan.is_sequential() => {
            warn!(
                "sequential image with scan parameters Ss={} Se={} Ah={} Al={}",
                scan.ss, scan.se, scan.ah, scan.al
            );
        }
        None => {}
    }

    // A component keeps the table that was current at its first scan.
    for sc in scan.components.iter() {
        let comp = &mut ctx.frame.components[sc.index];
        if comp.quant_table.is_some() {
            continue;
        }
        let slot = comp.quant_table_slot;
        let table = source
            .quant_table(slot)
            .ok_or(Error::MissingQuantTable(slot))?;
        comp.quant_table = Some(table.clone());
    }

    debug!(
        "scan {}: components {:?}, Ss={} Se={} Ah={} Al={}",
        ctx.input_scan_number, header.components, scan.ss, scan.se, scan.ah, scan.al
    );
    source.entropy_decoder().start_pass(&ctx.frame, &scan)?;
    ctx.scan = Some(scan);
    coef.start_input_pass(ctx)?;
    ctx.in_scan = true;
    Ok(())
}

/// Called when the last iMCU row of a scan has been consumed.
pub fn finish_input_pass(ctx: &mut DecodeContext) {
    ctx.in_scan = false;
}
