// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{DctMethod, mem::BackingStoreFactory};

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct DecompressOptions {
    /// Inverse DCT used for every component.
    pub dct_method: DctMethod,
    /// Estimate missing low-frequency AC coefficients of partially decoded progressive
    /// images from neighbouring DC values.
    /// Default: true
    pub block_smoothing: bool,
    /// Keep every coefficient in memory and let the caller run one output pass per scan
    /// (`start_output` / `finish_output`), instead of a single pass over the final image.
    /// Default: false
    pub buffered_image: bool,
    /// Memory budget in bytes for whole-image coefficient arrays. Arrays that do not fit
    /// keep a window of rows in memory and page the rest to a backing store.
    /// Set to `None` to keep everything in memory.
    pub max_memory_bytes: Option<usize>,
    /// Where rows evicted from the coefficient arrays go.
    pub backing_store: BackingStoreFactory,
    /// Run the inverse DCTs of a block row on the rayon thread pool. Output is identical
    /// either way. Ignored without the `parallel` feature.
    pub parallel: bool,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            dct_method: DctMethod::default(),
            block_smoothing: true,
            buffered_image: false,
            max_memory_bytes: None,
            backing_store: BackingStoreFactory::default(),
            parallel: cfg!(feature = "parallel"),
        }
    }
}
