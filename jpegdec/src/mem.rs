// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Whole-image block arrays that keep only a window of rows in memory.
//!
//! Arrays are first requested with [`BlockArray::request`], then all of them are realized
//! together by [`realize_block_arrays`], which decides from the memory budget how many rows
//! each one keeps resident. Rows outside the resident window live in a [`BackingStore`] and
//! are paged in and out by [`BlockArray::access`].

mod backing;

use std::fmt::Debug;

pub use backing::*;

use crate::{
    BLOCK_SIZE,
    block::Block,
    error::{Error, Result},
    util::{tracing_wrappers::*, try_filled_vec},
};

pub struct BlockArray {
    rows: usize,
    blocks_per_row: usize,
    max_access: usize,
    pre_zero: bool,
    // Everything below is set up on realization.
    realized: bool,
    rows_in_mem: usize,
    mem: Vec<Block>,
    /// First row held in `mem`.
    cur_start_row: usize,
    /// Rows at and after this one have never been written.
    first_undef_row: usize,
    /// `mem` holds rows not yet copied to the backing store.
    dirty: bool,
    backing: Option<Box<dyn BackingStore>>,
}

impl Debug for BlockArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlockArray {}x{} (access {}, resident {} from {}, defined {}{})",
            self.blocks_per_row,
            self.rows,
            self.max_access,
            self.rows_in_mem,
            self.cur_start_row,
            self.first_undef_row,
            if self.backing.is_some() { ", paged" } else { "" }
        )
    }
}

impl BlockArray {
    /// Describes an array of `rows` rows of `blocks_per_row` blocks that will be accessed at
    /// most `max_access` rows at a time. Nothing is allocated until the array is realized.
    ///
    /// When `pre_zero` is set, rows read before ever being written come back zero-filled.
    pub fn request(blocks_per_row: usize, rows: usize, max_access: usize, pre_zero: bool) -> Self {
        Self {
            rows,
            blocks_per_row,
            max_access,
            pre_zero,
            realized: false,
            rows_in_mem: 0,
            mem: Vec::new(),
            cur_start_row: 0,
            first_undef_row: 0,
            dirty: false,
            backing: None,
        }
    }

    pub fn blocks_per_row(&self) -> usize {
        self.blocks_per_row
    }

    pub fn rows_in_mem(&self) -> usize {
        self.rows_in_mem
    }

    pub fn is_paged(&self) -> bool {
        self.backing.is_some()
    }

    fn bytes_per_row(&self) -> Option<usize> {
        self.blocks_per_row.checked_mul(std::mem::size_of::<Block>())
    }

    fn realize(&mut self, rows_in_mem: usize, backing: Option<Box<dyn BackingStore>>) -> Result<()> {
        let len = rows_in_mem
            .checked_mul(self.blocks_per_row)
            .ok_or(Error::ArithmeticOverflow)?;
        self.mem = try_filled_vec(len, [0; BLOCK_SIZE])?;
        self.rows_in_mem = rows_in_mem;
        self.backing = backing;
        self.cur_start_row = 0;
        self.first_undef_row = 0;
        self.dirty = false;
        self.realized = true;
        Ok(())
    }

    /// Copies the defined part of the resident window to or from the backing store.
    fn do_io(&mut self, writing: bool) -> Result<()> {
        let Some(backing) = self.backing.as_mut() else {
            return Ok(());
        };
        let rows = self
            .rows_in_mem
            .min(self.first_undef_row.saturating_sub(self.cur_start_row))
            .min(self.rows - self.cur_start_row);
        if rows == 0 {
            return Ok(());
        }
        let offset = (self.cur_start_row * self.blocks_per_row) as u64;
        let blocks = &mut self.mem[..rows * self.blocks_per_row];
        if writing {
            backing.write_blocks(offset, blocks)
        } else {
            backing.read_blocks(offset, blocks)
        }
    }

    /// Returns rows `start_row..start_row + num_rows`, contiguous, `blocks_per_row` blocks
    /// per row.
    ///
    /// A `writable` access marks the rows as defined. Writers must proceed without leaving
    /// holes of undefined rows.
    pub fn access(&mut self, start_row: usize, num_rows: usize, writable: bool) -> Result<&mut [Block]> {
        let end_row = start_row
            .checked_add(num_rows)
            .ok_or(Error::ArithmeticOverflow)?;
        if end_row > self.rows || num_rows > self.max_access {
            return Err(Error::InvalidBlockAccess(
                start_row,
                end_row,
                self.rows,
                self.max_access,
            ));
        }
        if !self.realized {
            return Err(Error::UnrealizedBlockArray);
        }

        if start_row < self.cur_start_row || end_row > self.cur_start_row + self.rows_in_mem {
            if self.backing.is_none() {
                // A fully resident array never needs to move.
                return Err(Error::InvalidBlockAccess(
                    start_row,
                    end_row,
                    self.rows,
                    self.max_access,
                ));
            }
            if self.dirty {
                self.do_io(true)?;
                self.dirty = false;
            }
            // Moving forward, put the requested rows at the top of the window; moving
            // backward, at the bottom.
            self.cur_start_row = if start_row > self.cur_start_row {
                start_row
            } else {
                end_row.saturating_sub(self.rows_in_mem)
            };
            trace!(
                "block array window moved to rows {}..{}",
                self.cur_start_row,
                self.cur_start_row + self.rows_in_mem
            );
            self.do_io(false)?;
        }

        if self.first_undef_row < end_row {
            let undef_row = if self.first_undef_row < start_row {
                if writable {
                    return Err(Error::UndefinedBlockRows(self.first_undef_row, start_row));
                }
                start_row
            } else {
                self.first_undef_row
            };
            if writable {
                self.first_undef_row = end_row;
            }
            if self.pre_zero {
                let bpr = self.blocks_per_row;
                let from = (undef_row - self.cur_start_row) * bpr;
                let to = (end_row - self.cur_start_row) * bpr;
                self.mem[from..to].fill([0; BLOCK_SIZE]);
            } else if !writable {
                return Err(Error::UndefinedBlockRows(undef_row, end_row));
            }
        }

        if writable {
            self.dirty = true;
        }
        let bpr = self.blocks_per_row;
        let from = (start_row - self.cur_start_row) * bpr;
        Ok(&mut self.mem[from..from + num_rows * bpr])
    }
}

/// Allocates the resident windows of all not-yet-realized arrays.
///
/// With no budget, or a budget covering every array completely, all rows stay in memory.
/// Otherwise the budget is split so every array keeps the same number of multiples of its
/// `max_access` rows (at least one), and the rest of each array goes to a backing store.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(arrays), err))]
pub fn realize_block_arrays(
    arrays: &mut [BlockArray],
    max_memory: Option<usize>,
    backing: &BackingStoreFactory,
) -> Result<()> {
    let mut space_per_minheight = 0usize;
    let mut maximum_space = 0usize;
    for array in arrays.iter().filter(|a| !a.realized) {
        let bytes_per_row = array.bytes_per_row().ok_or(Error::ArithmeticOverflow)?;
        space_per_minheight = bytes_per_row
            .checked_mul(array.max_access)
            .and_then(|s| s.checked_add(space_per_minheight))
            .ok_or(Error::ArithmeticOverflow)?;
        maximum_space = bytes_per_row
            .checked_mul(array.rows)
            .and_then(|s| s.checked_add(maximum_space))
            .ok_or(Error::ArithmeticOverflow)?;
    }
    if space_per_minheight == 0 {
        return Ok(());
    }

    let max_minheights = match max_memory {
        Some(avail) if avail < maximum_space => (avail / space_per_minheight).max(1),
        _ => usize::MAX,
    };

    for array in arrays.iter_mut().filter(|a| !a.realized) {
        let minheights = array.rows.div_ceil(array.max_access.max(1));
        if minheights <= max_minheights {
            debug!("block array {}x{} kept in memory", array.blocks_per_row, array.rows);
            array.realize(array.rows, None)?;
        } else {
            let rows_in_mem = max_minheights * array.max_access;
            debug!(
                "block array {}x{} paged, {rows_in_mem} rows resident",
                array.blocks_per_row, array.rows
            );
            array.realize(rows_in_mem, Some(backing.create()?))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use test_log::test;

    fn row_value(row: usize, block: usize) -> Block {
        std::array::from_fn(|i| (row * 1000 + block * 64 + i) as i16)
    }

    fn fill_rows(array: &mut BlockArray, start: usize, count: usize) -> Result<()> {
        let bpr = array.blocks_per_row();
        let window = array.access(start, count, true)?;
        for (r, row) in window.chunks_exact_mut(bpr).enumerate() {
            for (b, block) in row.iter_mut().enumerate() {
                *block = row_value(start + r, b);
            }
        }
        Ok(())
    }

    fn check_rows(array: &mut BlockArray, start: usize, count: usize) -> Result<()> {
        let bpr = array.blocks_per_row();
        let window = array.access(start, count, false)?;
        for (r, row) in window.chunks_exact(bpr).enumerate() {
            for (b, block) in row.iter().enumerate() {
                assert_eq!(*block, row_value(start + r, b), "row {} block {b}", start + r);
            }
        }
        Ok(())
    }

    #[test]
    fn resident_array() -> Result<()> {
        let mut arrays = [BlockArray::request(3, 6, 2, true)];
        realize_block_arrays(&mut arrays, None, &BackingStoreFactory::InMemory)?;
        let array = &mut arrays[0];
        assert!(!array.is_paged());
        assert_eq!(array.rows_in_mem(), 6);
        for start in (0..6).step_by(2) {
            fill_rows(array, start, 2)?;
        }
        check_rows(array, 1, 2)?;
        check_rows(array, 4, 2)?;
        Ok(())
    }

    #[test]
    fn undefined_rows() -> Result<()> {
        let mut arrays = [
            BlockArray::request(2, 4, 2, true),
            BlockArray::request(2, 4, 2, false),
        ];
        realize_block_arrays(&mut arrays, None, &BackingStoreFactory::InMemory)?;
        let [zeroed, raw] = &mut arrays;

        assert!(zeroed.access(0, 2, false)?.iter().all(|b| *b == [0; 64]));
        // A writer may not leave a hole.
        assert!(matches!(
            zeroed.access(2, 2, true),
            Err(Error::UndefinedBlockRows(0, 2))
        ));
        fill_rows(zeroed, 0, 2)?;
        fill_rows(zeroed, 2, 2)?;

        assert!(matches!(
            raw.access(0, 1, false),
            Err(Error::UndefinedBlockRows(0, 1))
        ));
        fill_rows(raw, 0, 1)?;
        check_rows(raw, 0, 1)?;
        Ok(())
    }

    #[test]
    fn bad_access() -> Result<()> {
        let mut array = BlockArray::request(2, 4, 2, true);
        assert!(matches!(
            array.access(0, 1, false),
            Err(Error::UnrealizedBlockArray)
        ));
        realize_block_arrays(std::slice::from_mut(&mut array), None, &Default::default())?;
        assert!(matches!(
            array.access(3, 2, false),
            Err(Error::InvalidBlockAccess(3, 5, 4, 2))
        ));
        assert!(matches!(
            array.access(0, 3, false),
            Err(Error::InvalidBlockAccess(0, 3, 4, 2))
        ));
        Ok(())
    }

    #[test]
    fn budget_split() -> Result<()> {
        let row_bytes = 4 * std::mem::size_of::<Block>();
        let mut arrays = [
            BlockArray::request(4, 40, 3, true),
            BlockArray::request(4, 5, 3, true),
        ];
        // Room for two minimum heights of both arrays.
        realize_block_arrays(
            &mut arrays,
            Some(2 * 6 * row_bytes + 10),
            &BackingStoreFactory::InMemory,
        )?;
        assert!(arrays[0].is_paged());
        assert_eq!(arrays[0].rows_in_mem(), 6);
        assert!(!arrays[1].is_paged());
        assert_eq!(arrays[1].rows_in_mem(), 5);
        Ok(())
    }

    #[test]
    fn paging_preserves_contents() -> Result<()> {
        let mut arrays = [BlockArray::request(3, 50, 3, true)];
        realize_block_arrays(&mut arrays, Some(1), &BackingStoreFactory::InMemory)?;
        let array = &mut arrays[0];
        assert!(array.is_paged());
        assert_eq!(array.rows_in_mem(), 3);

        for start in (0..48).step_by(3) {
            fill_rows(array, start, 3)?;
        }
        fill_rows(array, 48, 2)?;

        let mut rng = XorShiftRng::seed_from_u64(7);
        for _ in 0..100 {
            let count = rng.random_range(1..=3);
            let start = rng.random_range(0..=50 - count);
            check_rows(array, start, count)?;
        }
        // Backward scan, as when re-reading an earlier part of the image.
        for start in (0..48).rev() {
            check_rows(array, start, 3)?;
        }
        Ok(())
    }

    #[test]
    fn paged_rewrite() -> Result<()> {
        let mut arrays = [BlockArray::request(1, 12, 2, true)];
        realize_block_arrays(&mut arrays, Some(1), &BackingStoreFactory::InMemory)?;
        let array = &mut arrays[0];
        for start in (0..12).step_by(2) {
            fill_rows(array, start, 2)?;
        }
        // Refine an early row after the window has moved on, as later scans do.
        array.access(2, 2, true)?[0][5] = -1;
        check_rows(array, 10, 2)?;
        assert_eq!(array.access(2, 1, false)?[0][5], -1);
        assert_eq!(array.access(3, 1, false)?[0], row_value(3, 0));
        Ok(())
    }
}
