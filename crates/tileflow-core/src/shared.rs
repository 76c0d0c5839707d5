//! Bounds-checked views shared between the worker threads of one phase
//!
//! During a phase every worker writes a disjoint set of tiles (or flat column
//! segments) of the same buffer. Safe Rust cannot hand out several `&mut`
//! borrows of one slice to different threads, so [`SharedSlice`] keeps the raw
//! pointer and length and only produces sub-slices on request. Producing a
//! sub-slice is `unsafe`: the caller guarantees that no other thread writes the
//! same range while the returned borrow is live. Bounds are always checked.

use crate::descriptor::MatrixDescriptor;
use std::marker::PhantomData;
use std::ops::Range;

/// Shared handle to a mutable slice borrowed for the duration of one phase
pub struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// Safety: access is only handed out through the unsafe accessors below, whose
// callers uphold the one-writer-per-range rule.
unsafe impl<'a, T: Send + Sync> Send for SharedSlice<'a, T> {}
unsafe impl<'a, T: Send + Sync> Sync for SharedSlice<'a, T> {}

impl<'a, T> Clone for SharedSlice<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for SharedSlice<'a, T> {}

impl<'a, T> SharedSlice<'a, T> {
    /// Share `slice` for as long as the original borrow lasts
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Total length of the shared slice
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the shared slice is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn check(&self, range: &Range<usize>) {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "range {range:?} outside shared slice of length {}",
            self.len
        );
    }

    /// Read-only view of `range`
    ///
    /// # Safety
    /// No thread may write any element of `range` while the borrow is live.
    #[inline]
    pub unsafe fn slice(&self, range: Range<usize>) -> &'a [T] {
        self.check(&range);
        std::slice::from_raw_parts(self.ptr.add(range.start), range.len())
    }

    /// Exclusive view of `range`
    ///
    /// # Safety
    /// No other thread may read or write any element of `range` while the
    /// borrow is live.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, range: Range<usize>) -> &'a mut [T] {
        self.check(&range);
        std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.len())
    }

    /// Read-only view of the slot of tile `(i, j)` of `desc`
    ///
    /// # Safety
    /// Same contract as [`SharedSlice::slice`].
    #[inline]
    pub unsafe fn tile(&self, desc: &MatrixDescriptor, i: usize, j: usize) -> &'a [T] {
        self.slice(desc.tile_range(i, j))
    }

    /// Exclusive view of the slot of tile `(i, j)` of `desc`
    ///
    /// # Safety
    /// Same contract as [`SharedSlice::slice_mut`].
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn tile_mut(&self, desc: &MatrixDescriptor, i: usize, j: usize) -> &'a mut [T] {
        self.slice_mut(desc.tile_range(i, j))
    }
}
