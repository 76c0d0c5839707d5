//! Per-tile progress counters gating cross-tile dependencies
//!
//! The table holds one signed step counter per tile of the operand a numerical
//! phase produces. The owner of a tile publishes progress with
//! [`ProgressTable::mark_done`]; a worker about to read a tile it does not own
//! waits for the required step with [`ProgressTable::wait_ready`]. Publishing
//! uses release ordering and observation uses acquire ordering, so everything
//! the producer wrote into the tile before marking it is visible to the
//! consumer once the step is observed.
//!
//! Counters only move forward within a phase; [`ProgressTable::clear`] resets
//! them to a sentinel before the next phase that needs them.

use crate::{Error, Result};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Sentinel meaning "not yet produced"
pub const NOT_PRODUCED: i64 = -1;

/// Exponential backoff for polling loops
///
/// Spins with a doubling number of `spin_loop` hints, then falls back to
/// yielding the thread once spinning stops paying off.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;

    /// Create a fresh backoff
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait a little longer than last time
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..1u32 << self.step {
                std::hint::spin_loop();
            }
            self.step += 1;
        } else {
            std::thread::yield_now();
        }
    }

    /// Whether the backoff has escalated to yielding
    pub fn is_yielding(&self) -> bool {
        self.step > Self::SPIN_LIMIT
    }
}

/// Dependency table indexed by tile coordinates
#[derive(Debug, Default)]
pub struct ProgressTable {
    entries: Box<[AtomicI64]>,
    rows: usize,
    cols: usize,
    reallocations: usize,
}

impl ProgressTable {
    /// Create a table with no capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries the table can hold without reallocating
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// How many times the table has been reallocated
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Grid shape set by the last [`ProgressTable::clear`]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Grow to exactly `required` entries if the current capacity is smaller
    ///
    /// Returns whether a reallocation happened. On failure the existing
    /// entries are left in place.
    pub fn ensure_capacity(&mut self, required: usize) -> Result<bool> {
        if required <= self.entries.len() {
            return Ok(false);
        }
        let mut fresh: Vec<AtomicI64> = Vec::new();
        fresh
            .try_reserve_exact(required)
            .map_err(|_| Error::out_of_resources("progress table", required))?;
        fresh.extend((0..required).map(|_| AtomicI64::new(NOT_PRODUCED)));
        debug!(
            old = self.entries.len(),
            new = required,
            "reallocating progress table"
        );
        self.entries = fresh.into_boxed_slice();
        self.rows = 0;
        self.cols = 0;
        self.reallocations += 1;
        Ok(true)
    }

    /// Reset the first `rows * cols` entries to `sentinel` and adopt that grid
    pub fn clear(&mut self, rows: usize, cols: usize, sentinel: i64) -> Result<()> {
        let size = rows * cols;
        if size > self.entries.len() {
            return Err(Error::too_small("progress table", size, self.entries.len()));
        }
        for entry in &mut self.entries[..size] {
            *entry.get_mut() = sentinel;
        }
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "tile ({row}, {col}) outside progress grid {}x{}",
            self.rows,
            self.cols
        );
        row * self.cols + col
    }

    /// Record that tile `(row, col)` has reached `step`
    ///
    /// A lower step never overwrites a higher one.
    #[inline]
    pub fn mark_done(&self, row: usize, col: usize, step: i64) {
        self.entries[self.index(row, col)].fetch_max(step, Ordering::Release);
    }

    /// Current step of tile `(row, col)`
    #[inline]
    pub fn step(&self, row: usize, col: usize) -> i64 {
        self.entries[self.index(row, col)].load(Ordering::Acquire)
    }

    /// Whether tile `(row, col)` has reached at least `required`
    #[inline]
    pub fn is_ready(&self, row: usize, col: usize, required: i64) -> bool {
        self.step(row, col) >= required
    }

    /// Block until tile `(row, col)` has reached at least `required`
    pub fn wait_ready(&self, row: usize, col: usize, required: i64) {
        let entry = &self.entries[self.index(row, col)];
        let mut backoff = Backoff::new();
        while entry.load(Ordering::Acquire) < required {
            backoff.snooze();
        }
    }
}
