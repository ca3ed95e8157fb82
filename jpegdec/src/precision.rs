// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Tracking of how many low-order bits of each coefficient progressive scans have yet to send.

use crate::{
    BLOCK_SIZE,
    error::{Error, Result},
    headers::ScanInfo,
    util::tracing_wrappers::*,
};

const MAX_AL: u8 = 13;

/// Checks the spectral selection and successive approximation parameters of a progressive scan.
pub fn validate_progression(scan: &ScanInfo) -> Result<()> {
    let (ss, se, ah, al) = (scan.ss, scan.se, scan.ah, scan.al);
    let mut bad = if ss == 0 {
        se != 0
    } else {
        // AC scans carry a single component.
        se < ss || se as usize >= BLOCK_SIZE || scan.components.len() != 1
    };
    if ah != 0 && al.checked_add(1) != Some(ah) {
        bad = true;
    }
    if al > MAX_AL {
        bad = true;
    }
    if bad {
        return Err(Error::InvalidProgression(ss, se, ah, al));
    }
    Ok(())
}

/// Per component, per zigzag index: number of low bits still unknown, or -1 before the first
/// scan touching the coefficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoefPrecision {
    bits: Vec<[i32; BLOCK_SIZE]>,
}

impl CoefPrecision {
    pub fn new(num_components: usize) -> Self {
        Self {
            bits: vec![[-1; BLOCK_SIZE]; num_components],
        }
    }

    pub fn component(&self, component: usize) -> &[i32; BLOCK_SIZE] {
        &self.bits[component]
    }

    /// Records that `scan` has started: every coefficient in its band now lacks `Al` bits.
    ///
    /// Inconsistent progressions are tolerated and only logged.
    pub fn start_scan(&mut self, scan: &ScanInfo) {
        let is_dc_band = scan.is_dc_scan();
        for sc in scan.components.iter() {
            let bits = &mut self.bits[sc.index];
            if !is_dc_band && bits[0] < 0 {
                warn!(
                    "bogus progression: AC scan for component {} before its DC scan",
                    sc.index
                );
            }
            for (k, b) in bits
                .iter_mut()
                .enumerate()
                .take(scan.se as usize + 1)
                .skip(scan.ss as usize)
            {
                let expected = (*b).max(0);
                if scan.ah as i32 != expected {
                    warn!(
                        "bogus progression: component {} coefficient {k} expected Ah={expected}, got {}",
                        sc.index, scan.ah
                    );
                }
                *b = scan.al as i32;
            }
        }
    }
}
