//! Scratch memory reused across driver calls
//!
//! This module provides the two scratch regions a tiled driver needs:
//! - an aligned, zero-initialised tile arena holding every staged operand
//!   back-to-back in blocked layout
//! - the progress table gating cross-tile dependencies
//!
//! Both regions follow a high-water-mark policy: a request that fits the
//! current capacity never reallocates, a larger request releases the old
//! region and allocates exactly the requested size (no growth factor).

use crate::numeric::Scalar;
use crate::progress::ProgressTable;
use crate::{Error, Result};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use tracing::debug;

/// Alignment of tile arenas (one cache line)
pub const TILE_ALIGNMENT: usize = 64;

/// A zero-initialised buffer for plain-old-data type T with explicit alignment
///
/// Allocation failures are reported instead of aborting, so callers can turn
/// them into an out-of-resources status.
pub struct AlignedBuffer<T> {
    ptr: NonNull<T>,
    capacity: usize,
    layout: Option<Layout>,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Zeroable> AlignedBuffer<T> {
    /// Allocate `capacity` zeroed elements aligned to `alignment` bytes
    ///
    /// # Panics
    /// - If alignment is not a power of two
    /// - If alignment is less than the natural alignment of T
    pub fn try_zeroed(capacity: usize, alignment: usize) -> Result<Self> {
        assert!(
            alignment.is_power_of_two(),
            "Alignment must be a power of two"
        );
        assert!(
            alignment >= mem::align_of::<T>(),
            "Alignment must be at least {}",
            mem::align_of::<T>()
        );

        let bytes = capacity.checked_mul(mem::size_of::<T>());
        if capacity == 0 || bytes == Some(0) {
            return Ok(Self::empty());
        }
        let layout = bytes
            .and_then(|bytes| Layout::from_size_align(bytes, alignment).ok())
            .ok_or_else(|| Error::out_of_resources("aligned buffer", capacity))?;

        // Safety: layout has non-zero size; all-zero bytes are a valid T
        let raw = unsafe { alloc_zeroed(layout) } as *mut T;
        let ptr = NonNull::new(raw).ok_or_else(|| Error::out_of_resources("aligned buffer", capacity))?;

        Ok(Self {
            ptr,
            capacity,
            layout: Some(layout),
            _marker: PhantomData,
        })
    }
}

impl<T> AlignedBuffer<T> {
    /// A buffer with no storage
    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: 0,
            layout: None,
            _marker: PhantomData,
        }
    }

    /// Get the whole buffer as a slice
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    /// Get the whole buffer as a mutable slice
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    /// Get the capacity of the buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Address of the first element
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }
}

impl<T> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            unsafe {
                dealloc(self.ptr.as_ptr() as *mut u8, layout);
            }
        }
    }
}

// Safety: AlignedBuffer owns its data and T is Send
unsafe impl<T: Send> Send for AlignedBuffer<T> {}
// Safety: AlignedBuffer owns its data and T is Sync
unsafe impl<T: Sync> Sync for AlignedBuffer<T> {}

/// Counters describing scratch usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Current tile arena capacity in elements
    pub tile_capacity: usize,
    /// Number of tile arena reallocations so far
    pub tile_reallocations: usize,
    /// Current progress table capacity in entries
    pub progress_capacity: usize,
    /// Number of progress table reallocations so far
    pub progress_reallocations: usize,
}

/// Owner of the scratch regions of one engine
///
/// Operand views into the arena are non-owning and are recomputed for every
/// call, since a reallocation moves the arena.
pub struct BufferPool<T> {
    tiles: AlignedBuffer<T>,
    progress: ProgressTable,
    tile_reallocations: usize,
}

impl<T: Scalar> BufferPool<T> {
    /// Create a pool with empty regions
    pub fn new() -> Self {
        Self {
            tiles: AlignedBuffer::empty(),
            progress: ProgressTable::new(),
            tile_reallocations: 0,
        }
    }

    /// Make the tile arena hold at least `required` elements
    ///
    /// Returns whether a reallocation happened. When growth fails the previous
    /// arena and its contents are left untouched.
    pub fn ensure_tile_capacity(&mut self, required: usize) -> Result<bool> {
        if required <= self.tiles.capacity() {
            return Ok(false);
        }
        let fresh = AlignedBuffer::try_zeroed(required, TILE_ALIGNMENT)
            .map_err(|_| Error::out_of_resources("tile arena", required))?;
        debug!(
            precision = T::PRECISION,
            old = self.tiles.capacity(),
            new = required,
            "reallocating tile arena"
        );
        self.tiles = fresh;
        self.tile_reallocations += 1;
        Ok(true)
    }

    /// Make the progress table hold at least `required` entries
    pub fn ensure_progress_capacity(&mut self, required: usize) -> Result<bool> {
        self.progress.ensure_capacity(required)
    }

    /// Current tile arena capacity (the high-water mark)
    pub fn tile_capacity(&self) -> usize {
        self.tiles.capacity()
    }

    /// The tile arena
    pub fn tiles(&self) -> &[T] {
        self.tiles.as_slice()
    }

    /// The tile arena, mutably
    pub fn tiles_mut(&mut self) -> &mut [T] {
        self.tiles.as_mut_slice()
    }

    /// The progress table
    pub fn progress(&self) -> &ProgressTable {
        &self.progress
    }

    /// Borrow both regions at once
    pub fn split_mut(&mut self) -> (&mut [T], &mut ProgressTable) {
        (self.tiles.as_mut_slice(), &mut self.progress)
    }

    /// Usage counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            tile_capacity: self.tiles.capacity(),
            tile_reallocations: self.tile_reallocations,
            progress_capacity: self.progress.capacity(),
            progress_reallocations: self.progress.reallocations(),
        }
    }
}

impl<T: Scalar> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
