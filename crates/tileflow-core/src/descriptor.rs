//! Tile-grid descriptors
//!
//! A [`MatrixDescriptor`] records the logical shape of one operand, its tile
//! edge length and where its tiles start inside a shared blocked buffer.
//! Every tile occupies a full `nb * nb` slot regardless of how many rows or
//! columns of the matrix it actually covers; ragged last tiles simply leave the
//! tail of their slot unused. Slots are laid out with the tile grid traversed
//! column-major, so tile `(i, j)` lives at slot `i + j * mt`.

use crate::{Error, Result};
use std::ops::Range;

/// Ceiling division for tile counts
#[inline]
pub fn ceil_div(value: usize, divisor: usize) -> usize {
    value.div_ceil(divisor)
}

/// Shape of one operand in blocked (tile) layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixDescriptor {
    m: usize,
    n: usize,
    nb: usize,
    mt: usize,
    nt: usize,
    offset: usize,
}

impl MatrixDescriptor {
    /// Describe an `m x n` matrix split into `nb x nb` tiles
    ///
    /// Fails if the blocked storage of the grid cannot be addressed.
    pub fn new(m: usize, n: usize, nb: usize) -> Result<Self> {
        if nb == 0 {
            return Err(Error::Shape("tile size must be positive".to_string()));
        }
        let (mt, nt) = (ceil_div(m, nb), ceil_div(n, nb));
        let fits = nb
            .checked_mul(nb)
            .and_then(|elems| elems.checked_mul(mt))
            .and_then(|elems| elems.checked_mul(nt))
            .is_some();
        if !fits {
            return Err(Error::Shape(format!(
                "{m}x{n} matrix in {nb}x{nb} tiles does not fit in memory"
            )));
        }
        Ok(Self {
            m,
            n,
            nb,
            mt,
            nt,
            offset: 0,
        })
    }

    /// Place this operand at `offset` elements into a shared buffer
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Logical row count
    #[inline]
    pub fn rows(&self) -> usize {
        self.m
    }

    /// Logical column count
    #[inline]
    pub fn cols(&self) -> usize {
        self.n
    }

    /// Tile edge length
    #[inline]
    pub fn nb(&self) -> usize {
        self.nb
    }

    /// Number of tile rows
    #[inline]
    pub fn mt(&self) -> usize {
        self.mt
    }

    /// Number of tile columns
    #[inline]
    pub fn nt(&self) -> usize {
        self.nt
    }

    /// Offset of the first tile inside the shared buffer
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Elements per tile slot
    #[inline]
    pub fn tile_elems(&self) -> usize {
        self.nb * self.nb
    }

    /// Number of tiles in the grid
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.mt * self.nt
    }

    /// Elements occupied by all tile slots of this operand
    #[inline]
    pub fn tiled_len(&self) -> usize {
        self.tile_count() * self.tile_elems()
    }

    /// One past the last element this operand occupies in the shared buffer
    ///
    /// Saturates at `usize::MAX` for offsets no buffer can reach.
    #[inline]
    pub fn end(&self) -> usize {
        self.checked_end().unwrap_or(usize::MAX)
    }

    /// One past the last element, or `None` if it does not fit in `usize`
    #[inline]
    pub fn checked_end(&self) -> Option<usize> {
        self.offset.checked_add(self.tiled_len())
    }

    /// Rows actually covered by tile row `i`
    #[inline]
    pub fn tile_rows(&self, i: usize) -> usize {
        debug_assert!(i < self.mt, "tile row {i} outside grid of {} rows", self.mt);
        (self.m - i * self.nb).min(self.nb)
    }

    /// Columns actually covered by tile column `j`
    #[inline]
    pub fn tile_cols(&self, j: usize) -> usize {
        debug_assert!(j < self.nt, "tile column {j} outside grid of {} columns", self.nt);
        (self.n - j * self.nb).min(self.nb)
    }

    /// Slot index of tile `(i, j)`
    #[inline]
    pub fn slot(&self, i: usize, j: usize) -> usize {
        i + j * self.mt
    }

    /// Tile coordinates of slot `slot`
    #[inline]
    pub fn coords(&self, slot: usize) -> (usize, usize) {
        (slot % self.mt, slot / self.mt)
    }

    /// Range of tile `(i, j)` inside the shared buffer
    #[inline]
    pub fn tile_range(&self, i: usize, j: usize) -> Range<usize> {
        let start = self.offset + self.slot(i, j) * self.tile_elems();
        start..start + self.tile_elems()
    }

    /// Whether the operand has no elements
    pub fn is_empty(&self) -> bool {
        self.m == 0 || self.n == 0
    }
}

/// Sequential assignment of named operands to one shared buffer
///
/// Offsets are relative to the start of the buffer, so they stay valid across
/// reallocations; they are recomputed for every call from the call's shapes.
#[derive(Debug, Clone, Default)]
pub struct ArenaPlan {
    operands: Vec<(&'static str, MatrixDescriptor)>,
    total: usize,
}

impl ArenaPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operand directly after the ones already planned
    pub fn push(&mut self, name: &'static str, desc: MatrixDescriptor) -> MatrixDescriptor {
        let placed = desc.with_offset(self.total);
        self.total = placed.end();
        self.operands.push((name, placed));
        placed
    }

    /// Look up a planned operand by name
    pub fn get(&self, name: &str) -> Option<&MatrixDescriptor> {
        self.operands
            .iter()
            .find(|(operand, _)| *operand == name)
            .map(|(_, desc)| desc)
    }

    /// Elements required by every planned operand together
    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let desc = MatrixDescriptor::new(10, 7, 4).unwrap();
        assert_eq!(desc.mt(), 3);
        assert_eq!(desc.nt(), 2);
        assert_eq!(desc.tile_rows(0), 4);
        assert_eq!(desc.tile_rows(2), 2);
        assert_eq!(desc.tile_cols(1), 3);
        assert_eq!(desc.tile_elems(), 16);
        assert_eq!(desc.tiled_len(), 6 * 16);
    }

    #[test]
    fn test_exact_multiple() {
        let desc = MatrixDescriptor::new(8, 8, 4).unwrap();
        assert_eq!(desc.mt(), 2);
        assert_eq!(desc.tile_rows(1), 4);
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        assert!(MatrixDescriptor::new(4, 4, 0).is_err());
    }

    #[test]
    fn test_oversized_grid_rejected() {
        assert!(MatrixDescriptor::new(4, 4, usize::MAX / 2).is_err());
        assert!(MatrixDescriptor::new(usize::MAX, usize::MAX, 2).is_err());
        assert!(MatrixDescriptor::new(usize::MAX / 4, 1, 1).is_ok());
    }

    #[test]
    fn test_end_saturates_past_address_space() {
        let desc = MatrixDescriptor::new(4, 4, 2).unwrap();
        assert_eq!(desc.with_offset(8).checked_end(), Some(24));
        let far = desc.with_offset(usize::MAX - 3);
        assert_eq!(far.checked_end(), None);
        assert_eq!(far.end(), usize::MAX);
    }

    #[test]
    fn test_empty_matrix() {
        let desc = MatrixDescriptor::new(0, 5, 4).unwrap();
        assert!(desc.is_empty());
        assert_eq!(desc.tile_count(), 0);
        assert_eq!(desc.tiled_len(), 0);
    }

    #[test]
    fn test_slot_coords_inverse() {
        let desc = MatrixDescriptor::new(13, 9, 4).unwrap();
        for slot in 0..desc.tile_count() {
            let (i, j) = desc.coords(slot);
            assert_eq!(desc.slot(i, j), slot);
        }
    }

    #[test]
    fn test_tile_range_with_offset() {
        let desc = MatrixDescriptor::new(8, 8, 4).unwrap().with_offset(100);
        assert_eq!(desc.tile_range(0, 0), 100..116);
        assert_eq!(desc.tile_range(1, 0), 116..132);
        assert_eq!(desc.tile_range(0, 1), 132..148);
        assert_eq!(desc.end(), 164);
    }

    #[test]
    fn test_arena_plan_places_operands_back_to_back() {
        let mut plan = ArenaPlan::new();
        let a = plan.push("a", MatrixDescriptor::new(8, 8, 4).unwrap());
        let b = plan.push("b", MatrixDescriptor::new(8, 3, 4).unwrap());
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), a.tiled_len());
        assert_eq!(plan.total(), a.tiled_len() + b.tiled_len());
        assert_eq!(plan.get("b"), Some(&b));
        assert!(plan.get("l").is_none());
    }
}
