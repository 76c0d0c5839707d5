//! Phase bodies run by every participant
//!
//! Each job writes only the tiles its share owns. Where one tile consumes
//! another, the producer publishes its progress in the [`ProgressTable`] and
//! the consumer waits for the step it needs before reading.
//!
//! Solve phases walk the tiles of B in row-major order (ascending for the
//! forward solve, descending for the backward solve). Dependencies only point
//! to smaller (forward) or larger (backward) tile rows, so with every
//! participant walking its own tiles in that order some tile can always make
//! progress.

use crate::job::{PhaseJob, WorkerShare};
use crate::kernels::{gemm_sub_tile, laswp_tile, trsm_lower_unit_tile, trsm_upper_tile};
use tileflow_core::{MatrixDescriptor, ProgressTable, Scalar, SharedSlice, TileLayout};
use tracing::trace;

/// Copy a flat operand into its blocked region
pub struct ToTiledJob<'a, T> {
    pub layout: TileLayout,
    pub flat: &'a [T],
    pub tiles: SharedSlice<'a, T>,
}

impl<T: Scalar> PhaseJob for ToTiledJob<'_, T> {
    fn convert_to_tiled(&self, share: &WorkerShare<'_>) {
        let desc = self.layout.descriptor();
        for slot in share.indices(desc.tile_count()) {
            let (i, j) = desc.coords(slot);
            // Safety: slots are disjoint and each belongs to exactly one share
            let tile = unsafe { self.tiles.tile_mut(desc, i, j) };
            self.layout.copy_tile_in(self.flat, i, j, tile);
        }
    }
}

/// Copy a blocked operand back into flat storage
pub struct FromTiledJob<'a, T> {
    pub layout: TileLayout,
    pub tiles: &'a [T],
    pub flat: SharedSlice<'a, T>,
}

impl<T: Scalar> PhaseJob for FromTiledJob<'_, T> {
    fn convert_from_tiled(&self, share: &WorkerShare<'_>) {
        let desc = self.layout.descriptor();
        for slot in share.indices(desc.tile_count()) {
            let (i, j) = desc.coords(slot);
            let tile = &self.tiles[desc.tile_range(i, j)];
            for c in 0..desc.tile_cols(j) {
                // Safety: column segments of different tiles never overlap
                let segment = unsafe { self.flat.slice_mut(self.layout.flat_column(i, j, c)) };
                self.layout.copy_column_out(tile, i, c, segment);
            }
        }
    }
}

/// Tiled forward substitution `B <- L^-1 * P * B`
///
/// Progress of B tile `(i, j)`: 0 once its interchanges are applied, `p + 1`
/// once the contribution of tile row `p` is subtracted, and `i + 1` once it
/// is resolved against the diagonal block.
pub struct ForwardSolveJob<'a, T> {
    pub arena: SharedSlice<'a, T>,
    pub l: MatrixDescriptor,
    pub b: MatrixDescriptor,
    pub ipiv: &'a [usize],
    pub progress: &'a ProgressTable,
    pub ib: usize,
}

impl<T: Scalar> ForwardSolveJob<'_, T> {
    fn solve_tile(&self, i: usize, j: usize) {
        let nb = self.b.nb();
        let kt = self.l.nt();
        let rows = self.b.tile_rows(i);
        let cols = self.b.tile_cols(j);
        // Safety: this share is the only writer of B(i, j)
        let bij = unsafe { self.arena.tile_mut(&self.b, i, j) };

        if i < kt {
            let base = i * nb;
            let end = (base + nb).min(self.l.cols());
            let local: Vec<usize> = self.ipiv[base..end].iter().map(|&p| p - base).collect();
            laswp_tile(bij, nb, cols, &local);
        }
        self.progress.mark_done(i, j, 0);

        for p in 0..i.min(kt) {
            self.progress.wait_ready(p, j, p as i64 + 1);
            // Safety: B(p, j) is resolved and nobody writes it again this phase
            let bpj = unsafe { self.arena.tile(&self.b, p, j) };
            let lip = unsafe { self.arena.tile(&self.l, i, p) };
            gemm_sub_tile(bij, lip, bpj, nb, rows, cols, self.l.tile_cols(p));
            self.progress.mark_done(i, j, p as i64 + 1);
        }

        if i < kt {
            let lii = unsafe { self.arena.tile(&self.l, i, i) };
            trsm_lower_unit_tile(bij, lii, nb, rows, self.l.tile_cols(i), cols, self.ib);
            self.progress.mark_done(i, j, i as i64 + 1);
        }
    }
}

impl<T: Scalar> PhaseJob for ForwardSolveJob<'_, T> {
    fn tiled_solve(&self, share: &WorkerShare<'_>) {
        let ntrhs = self.b.nt();
        let count = self.b.mt() * ntrhs;
        trace!(rank = share.rank(), tiles = count, "forward solve share");
        for index in share.indices(count) {
            self.solve_tile(index / ntrhs, index % ntrhs);
        }
    }
}

/// Tiled backward substitution `B <- U^-1 * B` with `U` the upper triangle of A
///
/// Progress of B tile `(i, j)` counts the contributions applied to it and
/// reaches `nt - i` once it is resolved.
pub struct BackSolveJob<'a, T> {
    pub arena: SharedSlice<'a, T>,
    pub u: MatrixDescriptor,
    pub b: MatrixDescriptor,
    pub progress: &'a ProgressTable,
}

impl<T: Scalar> BackSolveJob<'_, T> {
    fn solve_tile(&self, i: usize, j: usize) {
        let nb = self.b.nb();
        let nt = self.u.nt();
        let rows = self.b.tile_rows(i);
        let cols = self.b.tile_cols(j);
        // Safety: this share is the only writer of B(i, j)
        let bij = unsafe { self.arena.tile_mut(&self.b, i, j) };

        let mut applied = 0;
        for p in (i + 1..nt).rev() {
            self.progress.wait_ready(p, j, (nt - p) as i64);
            // Safety: B(p, j) is resolved and nobody writes it again this phase
            let bpj = unsafe { self.arena.tile(&self.b, p, j) };
            let uip = unsafe { self.arena.tile(&self.u, i, p) };
            gemm_sub_tile(bij, uip, bpj, nb, rows, cols, self.u.tile_cols(p));
            applied += 1;
            self.progress.mark_done(i, j, applied);
        }

        let uii = unsafe { self.arena.tile(&self.u, i, i) };
        trsm_upper_tile(bij, uii, nb, rows, cols);
        self.progress.mark_done(i, j, applied + 1);
    }
}

impl<T: Scalar> PhaseJob for BackSolveJob<'_, T> {
    fn tiled_back_solve(&self, share: &WorkerShare<'_>) {
        let ntrhs = self.b.nt();
        let count = self.b.mt() * ntrhs;
        trace!(rank = share.rank(), tiles = count, "backward solve share");
        for index in share.indices(count).rev() {
            self.solve_tile(index / ntrhs, index % ntrhs);
        }
    }
}
