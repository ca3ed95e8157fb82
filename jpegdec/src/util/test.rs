// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use rand::Rng;

use crate::{
    BLOCK_SIZE,
    block::{Block, QuantTable},
    decompress::{Decompressor, ProcessingResult},
    entropy::{EntropyDecoder, McuStatus, ScanEvent, ScanSource},
    error::Result,
    headers::{ComponentSpec, FrameHeader, FrameInfo, ScanHeader, ScanInfo},
    image::Plane,
    raw::{RawStreamSource, RawStreamWriter},
};

/// A frame whose components all use quantization table slot 0.
pub fn frame_header(
    width: usize,
    height: usize,
    sampling: &[(usize, usize)],
    progressive: bool,
) -> FrameHeader {
    FrameHeader {
        width,
        height,
        progressive,
        components: sampling
            .iter()
            .enumerate()
            .map(|(i, &(h, v))| ComponentSpec::new(i as u8 + 1, h, v, 0))
            .collect(),
    }
}

pub fn flat_quant_table(value: u16) -> QuantTable {
    QuantTable::new([value; BLOCK_SIZE])
}

/// Coarser towards high frequencies, like the tables of real encoders.
pub fn ramp_quant_table() -> QuantTable {
    QuantTable::new(std::array::from_fn(|i| 2 + 2 * (i / 8 + i % 8) as u16))
}

/// DC anywhere in a moderate range, AC sparse and shrinking with frequency.
pub fn random_block(rng: &mut impl Rng) -> Block {
    std::array::from_fn(|i| {
        if i == 0 {
            return rng.random_range(-60..60);
        }
        let limit = 24 / (1 + i / 8 + i % 8) as i16;
        if rng.random_bool(0.5) {
            0
        } else {
            rng.random_range(-limit..=limit)
        }
    })
}

pub fn random_coefficients(frame: &FrameInfo, rng: &mut impl Rng) -> Vec<Vec<Block>> {
    frame
        .components
        .iter()
        .map(|c| {
            (0..c.width_in_blocks * c.height_in_blocks)
                .map(|_| random_block(rng))
                .collect()
        })
        .collect()
}

fn scan(components: Vec<usize>, ss: u8, se: u8, ah: u8, al: u8) -> ScanHeader {
    ScanHeader {
        components,
        ss,
        se,
        ah,
        al,
    }
}

/// A full progression: interleaved DC with one bit held back, two AC bands with two bits held
/// back, then refinement of every bit.
pub fn progressive_script(num_components: usize) -> Vec<ScanHeader> {
    let all: Vec<usize> = (0..num_components).collect();
    let mut scans = vec![scan(all.clone(), 0, 0, 0, 1)];
    scans.extend((0..num_components).map(|c| scan(vec![c], 1, 5, 0, 2)));
    scans.extend((0..num_components).map(|c| scan(vec![c], 6, 63, 0, 2)));
    scans.extend((0..num_components).map(|c| scan(vec![c], 1, 63, 2, 1)));
    scans.push(scan(all, 0, 0, 1, 0));
    scans.extend((0..num_components).map(|c| scan(vec![c], 1, 63, 1, 0)));
    scans
}

/// Scans with their raw coded data.
pub fn encode_scans(
    frame: &FrameInfo,
    coefficients: &[Vec<Block>],
    scans: &[ScanHeader],
) -> Result<Vec<(ScanHeader, Vec<u8>)>> {
    let writer = RawStreamWriter::new(frame, coefficients)?;
    scans
        .iter()
        .map(|s| Ok((s.clone(), writer.write_scan(s)?)))
        .collect()
}

/// A finished source holding every scan of `scans`.
pub fn raw_source(
    frame: &FrameInfo,
    coefficients: &[Vec<Block>],
    scans: &[ScanHeader],
    quant: QuantTable,
) -> Result<RawStreamSource> {
    let mut source = RawStreamSource::new();
    source.set_quant_table(0, quant);
    for (header, data) in encode_scans(frame, coefficients, scans)? {
        source.push_scan(header);
        source.push_data(&data);
    }
    source.finish();
    Ok(source)
}

/// Counts decoded MCUs, and pretends to run out of input once before each listed MCU.
pub struct CountingSource<S> {
    inner: S,
    pub mcus: usize,
    suspend_at: Vec<usize>,
}

impl<S: ScanSource> CountingSource<S> {
    pub fn new(inner: S, suspend_at: &[usize]) -> Self {
        Self {
            inner,
            mcus: 0,
            suspend_at: suspend_at.to_vec(),
        }
    }
}

impl<S: ScanSource> EntropyDecoder for CountingSource<S> {
    fn start_pass(&mut self, frame: &FrameInfo, scan: &ScanInfo) -> Result<()> {
        self.inner.entropy_decoder().start_pass(frame, scan)
    }

    fn decode_mcu(&mut self, blocks: &mut [Block]) -> Result<McuStatus> {
        if let Some(pos) = self.suspend_at.iter().position(|&i| i == self.mcus) {
            self.suspend_at.swap_remove(pos);
            return Ok(McuStatus::NeedsMoreInput);
        }
        let status = self.inner.entropy_decoder().decode_mcu(blocks)?;
        if status == McuStatus::Complete {
            self.mcus += 1;
        }
        Ok(status)
    }
}

impl<S: ScanSource> ScanSource for CountingSource<S> {
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

/// Repeats `step` until it completes. Only for sources whose suspensions clear on retry.
pub fn complete<T>(mut step: impl FnMut() -> Result<ProcessingResult<T>>) -> Result<T> {
    for _ in 0..1000 {
        if let ProcessingResult::Complete { result } = step()? {
            return Ok(result);
        }
    }
    panic!("decoder made no progress");
}

/// Header to end of image, returning the final planes.
pub fn decode_image<S: ScanSource>(decoder: &mut Decompressor<S>) -> Result<Vec<Plane>> {
    complete(|| decoder.read_header())?;
    complete(|| decoder.start_decompress())?;
    let planes = complete(|| decoder.decode_planes())?;
    complete(|| decoder.finish_decompress())?;
    Ok(planes)
}
