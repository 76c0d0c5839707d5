//! Shared utilities for integration tests
#![allow(dead_code)]

pub use approx::assert_relative_eq;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tileflow_core::{EngineConfig, PartitionKind};
use tileflow_engine::EngineContext;

pub const EPSILON: f64 = 1e-10;

/// Install a subscriber honouring `RUST_LOG`, once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Engine with a fixed tile size
pub fn engine(cores: usize, nb: usize, partition: PartitionKind) -> EngineContext<f64> {
    let config = EngineConfig::default()
        .with_cores(cores)
        .with_blocking(nb, (nb / 2).max(1))
        .with_partition(partition);
    EngineContext::new(config).expect("engine starts")
}

/// Column-major `rows x cols` matrix with values in [-1, 1) and padding rows set to NaN
pub fn random_matrix(rng: &mut ChaCha8Rng, rows: usize, cols: usize, ld: usize) -> Vec<f64> {
    let mut flat = vec![f64::NAN; ld * cols];
    for c in 0..cols {
        for r in 0..rows {
            flat[r + c * ld] = rng.gen_range(-1.0..1.0);
        }
    }
    flat
}

/// Column-major matrix of small integers
pub fn integer_matrix(rng: &mut ChaCha8Rng, rows: usize, cols: usize, ld: usize) -> Vec<f64> {
    let mut flat = vec![0.0; ld * cols];
    for c in 0..cols {
        for r in 0..rows {
            flat[r + c * ld] = rng.gen_range(-9i32..=9) as f64;
        }
    }
    flat
}

/// `m x k` unit lower-trapezoidal factor, leading dimension `m`
///
/// Off-diagonal entries are drawn from `values`.
pub fn unit_lower(
    rng: &mut ChaCha8Rng,
    m: usize,
    k: usize,
    mut values: impl FnMut(&mut ChaCha8Rng) -> f64,
) -> Vec<f64> {
    let mut flat = vec![0.0; m * k];
    for c in 0..k {
        flat[c + c * m] = 1.0;
        for r in c + 1..m {
            flat[r + c * m] = values(rng);
        }
    }
    flat
}

/// `n x n` upper-triangular factor with a dominant diagonal, leading dimension `n`
///
/// The strictly lower part is filled with garbage, which the solve must ignore.
pub fn upper(rng: &mut ChaCha8Rng, n: usize) -> Vec<f64> {
    let mut flat = vec![0.0; n * n];
    for c in 0..n {
        for r in 0..n {
            flat[r + c * n] = if r < c {
                rng.gen_range(-1.0..1.0)
            } else if r == c {
                rng.gen_range(2.0..4.0) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 }
            } else {
                1.0e6
            };
        }
    }
    flat
}

/// Pivots that stay inside their tile row
pub fn tile_pivots(rng: &mut ChaCha8Rng, m: usize, k: usize, nb: usize) -> Vec<usize> {
    (0..k)
        .map(|r| {
            let end = ((r / nb + 1) * nb).min(m);
            rng.gen_range(r..end)
        })
        .collect()
}

/// Untiled `B <- L^-1 * P * B`
#[allow(clippy::too_many_arguments)]
pub fn reference_forward(
    m: usize,
    k: usize,
    l: &[f64],
    ldl: usize,
    ipiv: &[usize],
    b: &mut [f64],
    ldb: usize,
    nrhs: usize,
) {
    for col in 0..nrhs {
        let x = &mut b[col * ldb..col * ldb + m];
        for (r, &p) in ipiv[..k].iter().enumerate() {
            x.swap(r, p);
        }
        for c in 0..k {
            for r in c + 1..m {
                x[r] -= l[r + c * ldl] * x[c];
            }
        }
    }
}

/// Untiled `B <- U^-1 * B`
pub fn reference_backward(n: usize, u: &[f64], ldu: usize, b: &mut [f64], ldb: usize, nrhs: usize) {
    for col in 0..nrhs {
        let x = &mut b[col * ldb..col * ldb + n];
        for c in (0..n).rev() {
            x[c] /= u[c + c * ldu];
            for r in 0..c {
                x[r] -= u[r + c * ldu] * x[c];
            }
        }
    }
}

/// Assert two column-major matrices agree on their leading `rows x cols` block
pub fn assert_matrix_close(actual: &[f64], expected: &[f64], rows: usize, cols: usize, ld: usize) {
    for c in 0..cols {
        for r in 0..rows {
            assert_relative_eq!(
                actual[r + c * ld],
                expected[r + c * ld],
                epsilon = EPSILON,
                max_relative = EPSILON
            );
        }
    }
}
