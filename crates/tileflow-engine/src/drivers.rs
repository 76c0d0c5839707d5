//! Driver routines
//!
//! Every driver checks its arguments before touching any buffer or waking any
//! worker, so a rejected call leaves the caller's output exactly as it was.
//! The solve drivers then stage their operands in the tile arena in the order
//! A, B, L, run the numerical phases and convert B back in place.

use crate::context::{EngineContext, EngineState};
use crate::dispatch::Action;
use crate::phases::{BackSolveJob, ForwardSolveJob, FromTiledJob, ToTiledJob};
use crate::tune::Blocking;
use tileflow_core::{
    checked_flat_len, ArenaPlan, Error, MatrixDescriptor, Result, Scalar, SharedSlice, TileLayout,
    TiledFactor, NOT_PRODUCED,
};
use tracing::{debug, instrument};

/// 1-based positions of the solve arguments, for status codes
struct Positions {
    m: usize,
    n: usize,
    nrhs: usize,
    a: usize,
    lda: usize,
    l: usize,
    ipiv: usize,
    b: usize,
    ldb: usize,
}

const TRSMPL: Positions = Positions {
    m: 1,
    n: 2,
    nrhs: 3,
    a: 4,
    lda: 5,
    l: 6,
    ipiv: 7,
    b: 8,
    ldb: 9,
};

const GETRS: Positions = Positions {
    m: 1,
    n: 1,
    nrhs: 2,
    a: 3,
    lda: 4,
    l: 5,
    ipiv: 6,
    b: 7,
    ldb: 8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Solve {
    Forward,
    Full,
}

/// Shape arguments of a solve after validation
#[derive(Debug, Clone, Copy)]
struct Problem {
    m: usize,
    n: usize,
    nrhs: usize,
    lda: usize,
    ldb: usize,
}

impl Problem {
    fn k(&self) -> usize {
        self.m.min(self.n)
    }

    fn is_empty(&self) -> bool {
        self.m.min(self.n).min(self.nrhs) == 0
    }
}

fn dimension(value: isize, position: usize, name: &'static str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::illegal(position, name, format!("must be non-negative, got {value}")))
}

#[allow(clippy::too_many_arguments)]
fn check_shapes(
    pos: &Positions,
    m: isize,
    n: isize,
    nrhs: isize,
    a_len: usize,
    lda: isize,
    b_len: usize,
    ldb: isize,
) -> Result<Problem> {
    let m = dimension(m, pos.m, "m")?;
    let n = dimension(n, pos.n, "n")?;
    let nrhs = dimension(nrhs, pos.nrhs, "nrhs")?;
    let lda = usize::try_from(lda)
        .ok()
        .filter(|&lda| lda >= m.max(1))
        .ok_or_else(|| Error::illegal(pos.lda, "lda", format!("must be at least max(1, {m}), got {lda}")))?;
    let rows_b = m.max(n);
    let ldb = usize::try_from(ldb)
        .ok()
        .filter(|&ldb| ldb >= rows_b.max(1))
        .ok_or_else(|| {
            Error::illegal(pos.ldb, "ldb", format!("must be at least max(1, {rows_b}), got {ldb}"))
        })?;
    let required_a = checked_flat_len(m, n, lda).ok_or_else(|| {
        Error::illegal(pos.lda, "lda", format!("{m}x{n} matrix with lda = {lda} cannot be addressed"))
    })?;
    let required_b = checked_flat_len(m, nrhs, ldb).ok_or_else(|| {
        Error::illegal(pos.ldb, "ldb", format!("{m}x{nrhs} matrix with ldb = {ldb} cannot be addressed"))
    })?;
    if a_len < required_a {
        return Err(Error::illegal(
            pos.a,
            "a",
            format!("holds {a_len} elements but {required_a} are required"),
        ));
    }
    if b_len < required_b {
        return Err(Error::illegal(
            pos.b,
            "b",
            format!("holds {b_len} elements but {required_b} are required"),
        ));
    }
    Ok(Problem {
        m,
        n,
        nrhs,
        lda,
        ldb,
    })
}

/// Check `L` and `IPIV` against the problem and the tile size in use
///
/// Interchanges never leave their tile row: for row `r` of tile row `t`,
/// `ipiv[r]` must lie in `[r, min((t + 1) * nb, m))`.
fn check_factor<T: Scalar>(
    pos: &Positions,
    problem: &Problem,
    nb: usize,
    l: &TiledFactor<T>,
    ipiv: &[usize],
) -> Result<()> {
    let (m, k) = (problem.m, problem.k());
    let desc = l.descriptor();
    if desc.rows() != m || desc.cols() != k {
        return Err(Error::illegal(
            pos.l,
            "l",
            format!("factor is {}x{} but {m}x{k} is required", desc.rows(), desc.cols()),
        ));
    }
    if l.nb() != nb {
        return Err(Error::illegal(
            pos.l,
            "l",
            format!("factor is tiled with nb = {} but the engine uses nb = {nb}", l.nb()),
        ));
    }
    if ipiv.len() < k {
        return Err(Error::illegal(
            pos.ipiv,
            "ipiv",
            format!("holds {} pivots but {k} are required", ipiv.len()),
        ));
    }
    for (r, &p) in ipiv[..k].iter().enumerate() {
        let end = ((r / nb + 1) * nb).min(m);
        if p < r || p >= end {
            return Err(Error::illegal(
                pos.ipiv,
                "ipiv",
                format!("pivot {p} of row {r} outside [{r}, {end})"),
            ));
        }
    }
    Ok(())
}

/// End of a caller-built descriptor inside its blocked buffer
fn blocked_end(desc: &MatrixDescriptor, position: usize) -> Result<usize> {
    desc.checked_end().ok_or_else(|| {
        Error::illegal(
            position,
            "desc",
            format!("blocked operand at offset {} cannot be addressed", desc.offset()),
        )
    })
}

impl<T: Scalar> EngineContext<T> {
    /// Forward solve `B <- L^-1 * P * B` with a tiled unit-lower factor
    ///
    /// `a` is the `m x n` matrix the factor came from (leading dimension
    /// `lda`), `l` the `m x min(m, n)` unit lower-trapezoidal factor tiled with
    /// the engine's tile size (see [`EngineContext::blocking_for`]), `ipiv` the
    /// 0-based tile-row-local pivots and `b` the right-hand sides with leading
    /// dimension `ldb >= max(1, m, n)`. Rows of `b` past `m` are not touched.
    #[allow(clippy::too_many_arguments)]
    #[instrument(level = "debug", skip(self, a, l, ipiv, b), fields(precision = T::PRECISION))]
    pub fn trsmpl(
        &self,
        m: isize,
        n: isize,
        nrhs: isize,
        a: &[T],
        lda: isize,
        l: &TiledFactor<T>,
        ipiv: &[usize],
        b: &mut [T],
        ldb: isize,
    ) -> Result<()> {
        let mut state = self.lock();
        state.pool_mut()?;
        let problem = check_shapes(&TRSMPL, m, n, nrhs, a.len(), lda, b.len(), ldb)?;
        solve(&mut state, Solve::Forward, &TRSMPL, problem, a, l, ipiv, b)
    }

    /// Solve `A * X = B` for square `A` from a tile-pivoted LU factorization
    ///
    /// `a` holds `U` in its upper triangle (strictly lower part ignored) and
    /// `l` the unit lower factor `L`, with `P * A0 = L * U`. B is overwritten
    /// with `X`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(level = "debug", skip(self, a, l, ipiv, b), fields(precision = T::PRECISION))]
    pub fn getrs(
        &self,
        n: isize,
        nrhs: isize,
        a: &[T],
        lda: isize,
        l: &TiledFactor<T>,
        ipiv: &[usize],
        b: &mut [T],
        ldb: isize,
    ) -> Result<()> {
        let mut state = self.lock();
        state.pool_mut()?;
        let problem = check_shapes(&GETRS, n, n, nrhs, a.len(), lda, b.len(), ldb)?;
        solve(&mut state, Solve::Full, &GETRS, problem, a, l, ipiv, b)
    }

    /// Convert a flat matrix into blocked layout using the worker pool
    ///
    /// `tiles` receives the operand at `desc.offset()`; other elements are
    /// left alone.
    #[instrument(level = "debug", skip_all, fields(m = desc.rows(), n = desc.cols(), nb = desc.nb()))]
    pub fn lapack_to_tile(
        &self,
        flat: &[T],
        ld: usize,
        desc: &MatrixDescriptor,
        tiles: &mut [T],
    ) -> Result<()> {
        let mut state = self.lock();
        let pool = state.pool_mut()?;
        let end = blocked_end(desc, 3)?;
        let layout = TileLayout::new(*desc, ld).map_err(|err| Error::illegal(2, "ld", err.to_string()))?;
        if flat.len() < layout.flat_len() {
            return Err(Error::illegal(
                1,
                "flat",
                format!("holds {} elements but {} are required", flat.len(), layout.flat_len()),
            ));
        }
        if tiles.len() < end {
            return Err(Error::illegal(
                4,
                "tiles",
                format!("holds {} elements but {end} are required", tiles.len()),
            ));
        }
        let job = ToTiledJob {
            layout,
            flat,
            tiles: SharedSlice::new(tiles),
        };
        pool.run_phase(Action::ConvertToTiled, &job)
    }

    /// Convert a blocked operand back into a flat matrix using the worker pool
    #[instrument(level = "debug", skip_all, fields(m = desc.rows(), n = desc.cols(), nb = desc.nb()))]
    pub fn tile_to_lapack(
        &self,
        tiles: &[T],
        desc: &MatrixDescriptor,
        flat: &mut [T],
        ld: usize,
    ) -> Result<()> {
        let mut state = self.lock();
        let pool = state.pool_mut()?;
        let end = blocked_end(desc, 2)?;
        if tiles.len() < end {
            return Err(Error::illegal(
                1,
                "tiles",
                format!("holds {} elements but {end} are required", tiles.len()),
            ));
        }
        let layout = TileLayout::new(*desc, ld).map_err(|err| Error::illegal(4, "ld", err.to_string()))?;
        if flat.len() < layout.flat_len() {
            return Err(Error::illegal(
                3,
                "flat",
                format!("holds {} elements but {} are required", flat.len(), layout.flat_len()),
            ));
        }
        let job = FromTiledJob {
            layout,
            tiles,
            flat: SharedSlice::new(flat),
        };
        pool.run_phase(Action::ConvertFromTiled, &job)
    }
}

#[allow(clippy::too_many_arguments)]
fn solve<T: Scalar>(
    state: &mut EngineState<T>,
    kind: Solve,
    pos: &Positions,
    problem: Problem,
    a: &[T],
    l: &TiledFactor<T>,
    ipiv: &[usize],
    b: &mut [T],
) -> Result<()> {
    if problem.is_empty() {
        debug!("quick return");
        return Ok(());
    }
    let Problem {
        m,
        n,
        nrhs,
        lda,
        ldb,
    } = problem;

    let Blocking { nb, ib } = state.tuner.blocking(m, n, nrhs);
    debug!(nb, ib, tuner = state.tuner.name(), "blocking chosen");
    check_factor(pos, &problem, nb, l, ipiv)?;

    let mut plan = ArenaPlan::new();
    let a_desc = plan.push("A", MatrixDescriptor::new(m, n, nb)?);
    let b_desc = plan.push("B", MatrixDescriptor::new(m, nrhs, nb)?);
    let l_desc = plan.push("L", MatrixDescriptor::new(m, problem.k(), nb)?);

    debug!(entries = b_desc.tile_count(), "ensuring progress table");
    state.buffers.ensure_progress_capacity(b_desc.tile_count())?;
    debug!(elements = plan.total(), "ensuring tile arena");
    state.buffers.ensure_tile_capacity(plan.total())?;

    let EngineState { pool, buffers, .. } = state;
    let pool = pool
        .as_mut()
        .ok_or_else(|| Error::NotInitialized("engine has been shut down".to_string()))?;
    let (tiles, progress) = buffers.split_mut();
    let a_layout = TileLayout::new(a_desc, lda)?;
    let b_layout = TileLayout::new(b_desc, ldb)?;

    debug!("converting A");
    pool.run_phase(
        Action::ConvertToTiled,
        &ToTiledJob {
            layout: a_layout,
            flat: a,
            tiles: SharedSlice::new(&mut tiles[..]),
        },
    )?;

    debug!("converting B");
    pool.run_phase(
        Action::ConvertToTiled,
        &ToTiledJob {
            layout: b_layout,
            flat: &*b,
            tiles: SharedSlice::new(&mut tiles[..]),
        },
    )?;

    debug!("accepting L");
    tiles[l_desc.offset()..l_desc.end()].copy_from_slice(l.tiles());

    progress.clear(b_desc.mt(), b_desc.nt(), NOT_PRODUCED)?;
    debug!("forward solve");
    pool.run_phase(
        Action::TiledSolve,
        &ForwardSolveJob {
            arena: SharedSlice::new(&mut tiles[..]),
            l: l_desc,
            b: b_desc,
            ipiv,
            progress: &*progress,
            ib,
        },
    )?;

    if kind == Solve::Full {
        progress.clear(b_desc.mt(), b_desc.nt(), NOT_PRODUCED)?;
        debug!("backward solve");
        pool.run_phase(
            Action::TiledBackSolve,
            &BackSolveJob {
                arena: SharedSlice::new(&mut tiles[..]),
                u: a_desc,
                b: b_desc,
                progress: &*progress,
            },
        )?;
    }

    debug!("converting B back");
    pool.run_phase(
        Action::ConvertFromTiled,
        &FromTiledJob {
            layout: b_layout,
            tiles: &tiles[..],
            flat: SharedSlice::new(b),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(m: usize, n: usize) -> Problem {
        Problem {
            m,
            n,
            nrhs: 1,
            lda: m.max(1),
            ldb: m.max(n).max(1),
        }
    }

    #[test]
    fn test_shape_positions() {
        let status = |m, n, nrhs, lda, ldb| {
            check_shapes(&TRSMPL, m, n, nrhs, 64, lda, 64, ldb)
                .unwrap_err()
                .status_code()
        };
        assert_eq!(status(-1, 2, 2, 2, 2), -1);
        assert_eq!(status(2, -3, 2, 2, 2), -2);
        assert_eq!(status(2, 2, -1, 2, 2), -3);
        assert_eq!(status(4, 2, 2, 3, 4), -5);
        assert_eq!(status(2, 4, 2, 2, 3), -9);
        assert_eq!(status(0, 0, 0, 0, 1), -5);
    }

    #[test]
    fn test_getrs_positions() {
        let err = check_shapes(&GETRS, -2, -2, 1, 0, 1, 0, 1).unwrap_err();
        assert_eq!(err.status_code(), -1);
        let err = check_shapes(&GETRS, 4, 4, 1, 8, 4, 16, 4).unwrap_err();
        assert_eq!(err.status_code(), -3);
        let err = check_shapes(&GETRS, 4, 4, 2, 16, 4, 5, 4).unwrap_err();
        assert_eq!(err.status_code(), -7);
    }

    #[test]
    fn test_buffer_lengths_use_leading_dimension() {
        // 3x2 with lda 5 needs 5 + 3 elements
        assert!(check_shapes(&TRSMPL, 3, 2, 1, 8, 5, 3, 3).is_ok());
        let err = check_shapes(&TRSMPL, 3, 2, 1, 7, 5, 3, 3).unwrap_err();
        assert_eq!(err.status_code(), -4);
    }

    #[test]
    fn test_unaddressable_leading_dimensions() {
        let huge = isize::MAX;
        let err = check_shapes(&TRSMPL, 2, 3, 1, 6, huge, 3, 3).unwrap_err();
        assert_eq!(err.status_code(), -5);
        let err = check_shapes(&TRSMPL, 2, 3, 3, 6, 2, 6, huge).unwrap_err();
        assert_eq!(err.status_code(), -9);
        let err = check_shapes(&GETRS, 3, 3, 1, 9, huge, 3, 3).unwrap_err();
        assert_eq!(err.status_code(), -4);
        // Large but addressable: the buffer is simply too short
        let err = check_shapes(&TRSMPL, 2, 3, 1, 6, huge / 2, 3, 3).unwrap_err();
        assert_eq!(err.status_code(), -4);
    }

    #[test]
    fn test_blocked_end_overflow() {
        let desc = MatrixDescriptor::new(4, 4, 2).unwrap().with_offset(usize::MAX - 1);
        assert_eq!(blocked_end(&desc, 3).unwrap_err().status_code(), -3);
        let desc = MatrixDescriptor::new(4, 4, 2).unwrap().with_offset(2);
        assert_eq!(blocked_end(&desc, 3).unwrap(), 18);
    }

    #[test]
    fn test_factor_checks() {
        let l = TiledFactor::<f64>::identity(6, 6, 4).unwrap();
        let p = problem(6, 6);
        assert!(check_factor(&TRSMPL, &p, 4, &l, &[0, 1, 2, 3, 4, 5]).is_ok());
        // Interchange inside the tile row
        assert!(check_factor(&TRSMPL, &p, 4, &l, &[3, 1, 2, 3, 5, 5]).is_ok());

        let status = |nb, ipiv: &[usize]| check_factor(&TRSMPL, &p, nb, &l, ipiv).unwrap_err().status_code();
        assert_eq!(status(2, &[0, 1, 2, 3, 4, 5]), -6);
        assert_eq!(status(4, &[0, 1, 2]), -7);
        // Crosses from tile row 0 into tile row 1
        assert_eq!(status(4, &[4, 1, 2, 3, 4, 5]), -7);
        // Points above the row
        assert_eq!(status(4, &[0, 0, 2, 3, 4, 5]), -7);
        // Past the last row
        assert_eq!(status(4, &[0, 1, 2, 3, 4, 6]), -7);

        let wrong_shape = TiledFactor::<f64>::identity(6, 5, 4).unwrap();
        let err = check_factor(&TRSMPL, &p, 4, &wrong_shape, &[0, 1, 2, 3, 4, 5]).unwrap_err();
        assert_eq!(err.status_code(), -6);
    }
}
