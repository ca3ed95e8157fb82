// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![allow(unused_imports)]

#[cfg(feature = "tracing")]
pub use tracing::{debug, info, instrument, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! debug_ {
    ($($arg:tt)+) => {
        if false {
            let _ = format_args!($($arg)+);
        }
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! info_ {
    ($($arg:tt)+) => {
        if false {
            let _ = format_args!($($arg)+);
        }
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_ {
    ($($arg:tt)+) => {
        if false {
            let _ = format_args!($($arg)+);
        }
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_ {
    ($($arg:tt)+) => {
        if false {
            let _ = format_args!($($arg)+);
        }
    };
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug_ as debug, info_ as info, trace_ as trace, warn_ as warn};
