// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::{
    fs::File,
    io::{Cursor, Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use byteorder::{ByteOrder, LittleEndian};
use tempdir::TempDir;

use crate::{BLOCK_SIZE, block::Block, error::Result, util::tracing_wrappers::*};

const BYTES_PER_BLOCK: u64 = (BLOCK_SIZE * 2) as u64;

/// Storage for the block rows of an array that do not fit in memory.
///
/// Offsets are counted in blocks from the start of the array.
pub trait BackingStore: Send {
    fn read_blocks(&mut self, offset: u64, blocks: &mut [Block]) -> Result<()>;
    fn write_blocks(&mut self, offset: u64, blocks: &[Block]) -> Result<()>;
}

/// Stores blocks as little-endian `i16`s in any seekable stream.
pub struct StreamBackingStore<F> {
    stream: F,
    scratch: Vec<u8>,
}

impl<F: Read + Write + Seek + Send> StreamBackingStore<F> {
    pub fn new(stream: F) -> Self {
        Self {
            stream,
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> F {
        self.stream
    }

    fn prepare(&mut self, offset: u64, num_blocks: usize) -> Result<()> {
        self.stream.seek(SeekFrom::Start(offset * BYTES_PER_BLOCK))?;
        let len = num_blocks * BLOCK_SIZE * 2;
        self.scratch.clear();
        self.scratch.try_reserve(len)?;
        self.scratch.resize(len, 0);
        Ok(())
    }
}

impl<F: Read + Write + Seek + Send> BackingStore for StreamBackingStore<F> {
    fn read_blocks(&mut self, offset: u64, blocks: &mut [Block]) -> Result<()> {
        self.prepare(offset, blocks.len())?;
        self.stream.read_exact(&mut self.scratch)?;
        LittleEndian::read_i16_into(&self.scratch, blocks.as_flattened_mut());
        Ok(())
    }

    fn write_blocks(&mut self, offset: u64, blocks: &[Block]) -> Result<()> {
        self.prepare(offset, blocks.len())?;
        LittleEndian::write_i16_into(blocks.as_flattened(), &mut self.scratch);
        self.stream.write_all(&self.scratch)?;
        Ok(())
    }
}

/// A backing file inside a private temporary directory, removed when dropped.
pub struct TempFileBackingStore {
    // Declared first so the file is closed before the directory is removed.
    store: StreamBackingStore<File>,
    _dir: TempDir,
}

impl TempFileBackingStore {
    pub fn new(parent: Option<&PathBuf>) -> Result<Self> {
        let dir = match parent {
            Some(parent) => TempDir::new_in(parent, "jpegdec")?,
            None => TempDir::new("jpegdec")?,
        };
        let path = dir.path().join("blocks.bin");
        debug!("opening backing store {path:?}");
        let file = File::options()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self {
            store: StreamBackingStore::new(file),
            _dir: dir,
        })
    }
}

impl BackingStore for TempFileBackingStore {
    fn read_blocks(&mut self, offset: u64, blocks: &mut [Block]) -> Result<()> {
        self.store.read_blocks(offset, blocks)
    }

    fn write_blocks(&mut self, offset: u64, blocks: &[Block]) -> Result<()> {
        self.store.write_blocks(offset, blocks)
    }
}

/// How backing stores are created for arrays that exceed the memory budget.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BackingStoreFactory {
    /// A temporary file in the system temporary directory.
    #[default]
    TempFile,
    /// A temporary file under the given directory.
    TempFileIn(PathBuf),
    /// A growable in-memory buffer. Only useful to exercise the paging logic.
    InMemory,
}

impl BackingStoreFactory {
    pub fn create(&self) -> Result<Box<dyn BackingStore>> {
        Ok(match self {
            Self::TempFile => Box::new(TempFileBackingStore::new(None)?),
            Self::TempFileIn(dir) => Box::new(TempFileBackingStore::new(Some(dir))?),
            Self::InMemory => Box::new(StreamBackingStore::new(Cursor::new(Vec::<u8>::new()))),
        })
    }
}
