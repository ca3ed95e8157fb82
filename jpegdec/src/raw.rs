// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! A trivially coded coefficient stream.
//!
//! Every block of an MCU contributes one little-endian `i16` per coefficient of the scan's
//! spectral band, in zigzag order. The values follow the successive approximation rules of
//! progressive JPEG:
//!
//! - first scan of a band (`Ah == 0`): the coefficient is `value << Al`;
//! - DC refinement: bit 0 of the value is bit `Al` of the coefficient;
//! - AC refinement: for a coefficient that is already nonzero, a nonzero value adds one more
//!   bit of magnitude (`2^Al`); a coefficient that is still zero becomes `value << Al`.
//!
//! [`RawStreamSource`] decodes such a stream as it arrives and [`RawStreamWriter`] produces it
//! from coefficient grids, which makes the pair usable for transcoding and for driving the
//! decoder without Huffman coding.

use std::collections::VecDeque;

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    BLOCK_SIZE,
    block::{Block, NATURAL_ORDER, QuantTable},
    entropy::{EntropyDecoder, McuStatus, ScanEvent, ScanSource},
    error::{Error, Result},
    headers::{FrameInfo, ScanHeader, ScanInfo},
    util::tracing_wrappers::*,
};

const BYTES_PER_VALUE: usize = 2;

#[derive(Clone, Copy, Debug)]
struct Band {
    ss: usize,
    se: usize,
    ah: u8,
    al: u8,
}

impl Band {
    fn values(&self) -> usize {
        self.se - self.ss + 1
    }
}

fn apply_value(coef: &mut i16, value: i16, is_dc: bool, band: Band) {
    let al = band.al as u32;
    if band.ah == 0 {
        *coef = ((value as i32) << al) as i16;
    } else if is_dc {
        if value & 1 != 0 {
            *coef |= 1 << al;
        }
    } else if *coef != 0 {
        let p1 = 1i16 << al;
        if value != 0 && *coef & p1 == 0 {
            if *coef >= 0 {
                *coef += p1;
            } else {
                *coef -= p1;
            }
        }
    } else if value != 0 {
        *coef = ((value as i32) << al) as i16;
    }
}

/// Value the stream carries for `coef` in a scan with the given successive approximation
/// parameters.
fn encode_value(coef: i16, is_dc: bool, ah: u8, al: u8) -> i16 {
    let coef = coef as i32;
    let magnitude = coef.abs();
    let value = if ah == 0 {
        if is_dc {
            coef >> al
        } else {
            (magnitude >> al) * coef.signum()
        }
    } else if is_dc {
        (coef >> al) & 1
    } else if magnitude >> ah != 0 {
        (magnitude >> al) & 1
    } else if magnitude >> al != 0 {
        coef.signum()
    } else {
        0
    };
    value as i16
}

/// Scans and coefficient data pushed in as they become available.
///
/// Scan headers and data are queued independently: data is one continuous byte stream and
/// each scan consumes exactly as many bytes as its geometry requires.
#[derive(Debug, Default)]
pub struct RawStreamSource {
    scans: VecDeque<ScanHeader>,
    data: Vec<u8>,
    pos: usize,
    finished: bool,
    quant_tables: Vec<Option<QuantTable>>,
    band: Option<Band>,
    warned_truncated: bool,
}

impl RawStreamSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quant_table(&mut self, slot: usize, table: QuantTable) {
        if self.quant_tables.len() <= slot {
            self.quant_tables.resize(slot + 1, None);
        }
        self.quant_tables[slot] = Some(table);
    }

    pub fn push_scan(&mut self, header: ScanHeader) {
        self.scans.push_back(header);
    }

    pub fn push_data(&mut self, data: &[u8]) {
        if self.pos > 0 {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
        self.data.extend_from_slice(data);
    }

    /// Marks the end of the image. Data still missing afterwards reads as zero.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bytes pushed but not yet decoded.
    pub fn pending_bytes(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_value(&mut self) -> i16 {
        if self.pos + BYTES_PER_VALUE > self.data.len() {
            return 0;
        }
        let value = LittleEndian::read_i16(&self.data[self.pos..self.pos + BYTES_PER_VALUE]);
        self.pos += BYTES_PER_VALUE;
        value
    }
}

impl EntropyDecoder for RawStreamSource {
    fn start_pass(&mut self, _frame: &FrameInfo, scan: &ScanInfo) -> Result<()> {
        if scan.se < scan.ss || scan.se as usize >= BLOCK_SIZE {
            return Err(Error::InvalidProgression(scan.ss, scan.se, scan.ah, scan.al));
        }
        self.band = Some(Band {
            ss: scan.ss as usize,
            se: scan.se as usize,
            ah: scan.ah,
            al: scan.al,
        });
        Ok(())
    }

    fn decode_mcu(&mut self, blocks: &mut [Block]) -> Result<McuStatus> {
        let band = self
            .band
            .ok_or(Error::InvalidState("raw stream decoded outside a scan"))?;
        let needed = blocks.len() * band.values() * BYTES_PER_VALUE;
        if self.pending_bytes() < needed {
            if !self.finished {
                return Ok(McuStatus::NeedsMoreInput);
            }
            if !self.warned_truncated {
                warn!("raw coefficient stream truncated, missing coefficients read as zero");
                self.warned_truncated = true;
            }
        }
        for block in blocks.iter_mut() {
            for k in band.ss..=band.se {
                let value = self.read_value();
                apply_value(&mut block[NATURAL_ORDER[k]], value, k == 0, band);
            }
        }
        Ok(McuStatus::Complete)
    }
}

impl ScanSource for RawStreamSource {
    fn next_scan(&mut self) -> Result<ScanEvent> {
        Ok(match self.scans.pop_front() {
            Some(header) => ScanEvent::Scan(header),
            None if self.finished => ScanEvent::EndOfImage,
            None => ScanEvent::NeedsMoreInput,
        })
    }

    fn quant_table(&self, slot: usize) -> Option<&QuantTable> {
        self.quant_tables.get(slot).and_then(Option::as_ref)
    }

    fn entropy_decoder(&mut self) -> &mut dyn EntropyDecoder {
        self
    }
}

/// Encodes whole-image coefficient grids, one scan at a time.
///
/// Grid `c` holds `width_in_blocks * height_in_blocks` blocks of component `c`, row by row.
/// Dummy blocks that pad MCUs past the image edges are coded as zero.
pub struct RawStreamWriter<'a> {
    frame: &'a FrameInfo,
    coefficients: &'a [Vec<Block>],
}

impl<'a> RawStreamWriter<'a> {
    pub fn new(frame: &'a FrameInfo, coefficients: &'a [Vec<Block>]) -> Result<Self> {
        if coefficients.len() != frame.num_components() {
            return Err(Error::InvalidComponentCount(coefficients.len()));
        }
        for (c, (comp, grid)) in frame.components.iter().zip(coefficients).enumerate() {
            let expected = comp.width_in_blocks * comp.height_in_blocks;
            if grid.len() != expected {
                return Err(Error::CoefficientGridMismatch(c, grid.len(), expected));
            }
        }
        Ok(Self {
            frame,
            coefficients,
        })
    }

    pub fn write_scan(&self, header: &ScanHeader) -> Result<Vec<u8>> {
        let scan = ScanInfo::new(self.frame, header)?;
        let (ss, se) = (scan.ss as usize, scan.se as usize);
        let mut values: Vec<i16> = Vec::new();
        for mcu_row in 0..scan.mcu_rows_in_scan {
            for mcu_col in 0..scan.mcus_per_row {
                for sc in scan.components.iter() {
                    let comp = &self.frame.components[sc.index];
                    for yindex in 0..sc.mcu_height {
                        for xindex in 0..sc.mcu_width {
                            let by = mcu_row * sc.mcu_height + yindex;
                            let bx = mcu_col * sc.mcu_width + xindex;
                            let block = (bx < comp.width_in_blocks
                                && by < comp.height_in_blocks)
                                .then(|| &self.coefficients[sc.index][by * comp.width_in_blocks + bx]);
                            values.extend((ss..=se).map(|k| {
                                block.map_or(0, |b| {
                                    encode_value(b[NATURAL_ORDER[k]], k == 0, scan.ah, scan.al)
                                })
                            }));
                        }
                    }
                }
            }
        }
        let mut bytes = vec![0; values.len() * BYTES_PER_VALUE];
        LittleEndian::write_i16_into(&values, &mut bytes);
        trace!("raw scan {:?}: {} bytes", header, bytes.len());
        Ok(bytes)
    }
}
