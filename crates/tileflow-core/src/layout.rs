//! Conversion between flat column-major (LAPACK) storage and blocked tiles
//!
//! [`TileLayout`] pairs a [`MatrixDescriptor`] with the leading dimension of
//! the flat matrix it mirrors. It owns no memory and spawns no threads; the
//! per-tile copies are the unit of work the conversion phases distribute over
//! the worker pool, and the whole-matrix helpers are plain sequential loops
//! over the same per-tile copies.
//!
//! Inside a tile, elements are column-major with leading dimension `nb`.

use crate::descriptor::MatrixDescriptor;
use crate::{Error, Result};
use std::ops::Range;

/// Minimum flat length of an `m x n` column-major matrix with leading dimension `ld`
///
/// Saturates at `usize::MAX`, which no slice can reach, so a length check
/// against the result rejects shapes whose storage cannot exist.
#[inline]
pub fn flat_len(m: usize, n: usize, ld: usize) -> usize {
    checked_flat_len(m, n, ld).unwrap_or(usize::MAX)
}

/// Minimum flat length, or `None` if it does not fit in `usize`
#[inline]
pub fn checked_flat_len(m: usize, n: usize, ld: usize) -> Option<usize> {
    if m == 0 || n == 0 {
        Some(0)
    } else {
        ld.checked_mul(n - 1)?.checked_add(m)
    }
}

/// Mapping between one flat matrix and its blocked representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    desc: MatrixDescriptor,
    ld: usize,
}

impl TileLayout {
    /// Pair a descriptor with the leading dimension of the flat matrix
    pub fn new(desc: MatrixDescriptor, ld: usize) -> Result<Self> {
        if ld < desc.rows().max(1) {
            return Err(Error::Shape(format!(
                "leading dimension {ld} is smaller than row count {}",
                desc.rows()
            )));
        }
        if checked_flat_len(desc.rows(), desc.cols(), ld).is_none() {
            return Err(Error::Shape(format!(
                "{}x{} matrix with leading dimension {ld} does not fit in memory",
                desc.rows(),
                desc.cols()
            )));
        }
        if desc.checked_end().is_none() {
            return Err(Error::Shape(format!(
                "blocked operand at offset {} does not fit in memory",
                desc.offset()
            )));
        }
        Ok(Self { desc, ld })
    }

    /// The blocked-side descriptor
    #[inline]
    pub fn descriptor(&self) -> &MatrixDescriptor {
        &self.desc
    }

    /// Leading dimension of the flat matrix
    #[inline]
    pub fn ld(&self) -> usize {
        self.ld
    }

    /// Minimum length of the flat matrix
    pub fn flat_len(&self) -> usize {
        flat_len(self.desc.rows(), self.desc.cols(), self.ld)
    }

    /// Flat index of element `(row, col)`
    #[inline]
    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        row + col * self.ld
    }

    /// Blocked-buffer index of element `(row, col)`
    #[inline]
    pub fn tiled_index(&self, row: usize, col: usize) -> usize {
        let nb = self.desc.nb();
        let (i, j) = (row / nb, col / nb);
        self.desc.tile_range(i, j).start + (row % nb) + (col % nb) * nb
    }

    /// Flat range holding column `c` of tile `(i, j)`
    #[inline]
    pub fn flat_column(&self, i: usize, j: usize, c: usize) -> Range<usize> {
        let nb = self.desc.nb();
        let start = self.flat_index(i * nb, j * nb + c);
        start..start + self.desc.tile_rows(i)
    }

    /// Range inside a tile slot holding column `c` of a tile with `rows` rows
    #[inline]
    pub fn tile_column(&self, c: usize, rows: usize) -> Range<usize> {
        let start = c * self.desc.nb();
        start..start + rows
    }

    /// Copy tile `(i, j)` out of the flat matrix into its slot
    ///
    /// `tile` is the tile's own `nb * nb` slot, not the whole blocked buffer.
    pub fn copy_tile_in<T: Copy>(&self, flat: &[T], i: usize, j: usize, tile: &mut [T]) {
        let rows = self.desc.tile_rows(i);
        for c in 0..self.desc.tile_cols(j) {
            tile[self.tile_column(c, rows)].copy_from_slice(&flat[self.flat_column(i, j, c)]);
        }
    }

    /// Copy one column of a tile slot back into its place in a flat column segment
    ///
    /// `segment` is exactly the range returned by [`TileLayout::flat_column`].
    #[inline]
    pub fn copy_column_out<T: Copy>(&self, tile: &[T], i: usize, c: usize, segment: &mut [T]) {
        segment.copy_from_slice(&tile[self.tile_column(c, self.desc.tile_rows(i))]);
    }

    /// Copy tile `(i, j)` from its slot back into the flat matrix
    pub fn copy_tile_out<T: Copy>(&self, tile: &[T], i: usize, j: usize, flat: &mut [T]) {
        for c in 0..self.desc.tile_cols(j) {
            let range = self.flat_column(i, j, c);
            self.copy_column_out(tile, i, c, &mut flat[range]);
        }
    }

    fn check_lengths(&self, flat: usize, tiled: usize) -> Result<()> {
        if flat < self.flat_len() {
            return Err(Error::too_small("flat matrix", self.flat_len(), flat));
        }
        if tiled < self.desc.end() {
            return Err(Error::too_small("blocked buffer", self.desc.end(), tiled));
        }
        Ok(())
    }

    /// Convert the whole flat matrix into blocked layout on the calling thread
    pub fn to_tiled<T: Copy>(&self, flat: &[T], tiled: &mut [T]) -> Result<()> {
        self.check_lengths(flat.len(), tiled.len())?;
        for slot in 0..self.desc.tile_count() {
            let (i, j) = self.desc.coords(slot);
            let range = self.desc.tile_range(i, j);
            self.copy_tile_in(flat, i, j, &mut tiled[range]);
        }
        Ok(())
    }

    /// Convert the whole blocked operand back into the flat matrix on the calling thread
    pub fn from_tiled<T: Copy>(&self, tiled: &[T], flat: &mut [T]) -> Result<()> {
        self.check_lengths(flat.len(), tiled.len())?;
        for slot in 0..self.desc.tile_count() {
            let (i, j) = self.desc.coords(slot);
            self.copy_tile_out(&tiled[self.desc.tile_range(i, j)], i, j, flat);
        }
        Ok(())
    }
}
