//! Tile-local kernels
//!
//! Every kernel works on full `nb * nb` tile slots (column-major, leading
//! dimension `nb`) and touches only the leading rows and columns it is told
//! to, so ragged edge tiles need no special casing by the caller. Kernels
//! read their inputs, write one output tile, never block and never fail.

use tileflow_core::Scalar;

/// Apply row interchanges to the leading `cols` columns of a tile
///
/// Row `r` is swapped with row `pivots[r]` for `r` in ascending order; all
/// pivots are local to the tile.
pub fn laswp_tile<T: Scalar>(tile: &mut [T], nb: usize, cols: usize, pivots: &[usize]) {
    for (r, &p) in pivots.iter().enumerate() {
        if p == r {
            continue;
        }
        debug_assert!(p < nb, "pivot {p} outside tile of {nb} rows");
        for c in 0..cols {
            tile.swap(r + c * nb, p + c * nb);
        }
    }
}

/// `c[..m, ..n] -= a[..m, ..k] * b[..k, ..n]`
#[allow(clippy::too_many_arguments)]
pub fn gemm_sub_tile<T: Scalar>(
    c: &mut [T],
    a: &[T],
    b: &[T],
    nb: usize,
    m: usize,
    n: usize,
    k: usize,
) {
    for col in 0..n {
        let c_col = &mut c[col * nb..col * nb + m];
        for l in 0..k {
            let blk = b[l + col * nb];
            if blk == T::zero() {
                continue;
            }
            let a_col = &a[l * nb..l * nb + m];
            for (ci, &ai) in c_col.iter_mut().zip(a_col) {
                *ci -= ai * blk;
            }
        }
    }
}

/// Solve `L * X = B` in place with a unit lower-trapezoidal `L`
///
/// `l` covers `rows x k` with `k <= rows`; its top `k x k` block is unit
/// lower triangular and the rows below it are a plain rectangle, so the rows
/// of `b` past `k` only receive updates. The columns of `L` are processed in
/// panels of `ib`: each panel is solved column by column, then applied to the
/// rows below it in one sweep.
#[allow(clippy::too_many_arguments)]
pub fn trsm_lower_unit_tile<T: Scalar>(
    b: &mut [T],
    l: &[T],
    nb: usize,
    rows: usize,
    k: usize,
    ncols: usize,
    ib: usize,
) {
    debug_assert!(k <= rows, "trapezoid of {rows} rows cannot have {k} columns");
    let ib = ib.max(1);
    let mut start = 0;
    while start < k {
        let end = (start + ib).min(k);
        for col in 0..ncols {
            let x = &mut b[col * nb..col * nb + rows];
            // Inside the panel
            for p in start..end {
                let xp = x[p];
                if xp == T::zero() {
                    continue;
                }
                for r in p + 1..end {
                    x[r] -= l[r + p * nb] * xp;
                }
            }
            // Below the panel
            for p in start..end {
                let xp = x[p];
                if xp == T::zero() {
                    continue;
                }
                for r in end..rows {
                    x[r] -= l[r + p * nb] * xp;
                }
            }
        }
        start = end;
    }
}

/// Solve `U * X = B` in place with a non-unit upper-triangular `n x n` block `U`
pub fn trsm_upper_tile<T: Scalar>(b: &mut [T], u: &[T], nb: usize, n: usize, ncols: usize) {
    for col in 0..ncols {
        let x = &mut b[col * nb..col * nb + n];
        for p in (0..n).rev() {
            x[p] = x[p] / u[p + p * nb];
            let xp = x[p];
            if xp == T::zero() {
                continue;
            }
            for r in 0..p {
                x[r] -= u[r + p * nb] * xp;
            }
        }
    }
}
