//! Forward plus backward tiled solves

mod common;

use common::{
    assert_matrix_close, engine, reference_backward, reference_forward, rng, tile_pivots,
    unit_lower, upper,
};
use rand::Rng;
use tileflow_core::{EngineConfig, PartitionKind, TiledFactor};
use tileflow_engine::EngineContext;

struct System {
    n: usize,
    l_flat: Vec<f64>,
    u: Vec<f64>,
    ipiv: Vec<usize>,
}

impl System {
    fn new(seed: u64, n: usize, nb: usize) -> Self {
        let mut rng = rng(seed);
        let l_flat = unit_lower(&mut rng, n, n, |rng| rng.gen_range(-0.3..0.3));
        let u = upper(&mut rng, n);
        let ipiv = tile_pivots(&mut rng, n, n, nb);
        Self { n, l_flat, u, ipiv }
    }

    fn factor(&self, nb: usize) -> TiledFactor<f64> {
        TiledFactor::from_lapack(self.n, self.n, &self.l_flat, self.n, nb).unwrap()
    }

    fn reference(&self, b: &[f64], ldb: usize, nrhs: usize) -> Vec<f64> {
        let mut x = b.to_vec();
        reference_forward(self.n, self.n, &self.l_flat, self.n, &self.ipiv, &mut x, ldb, nrhs);
        reference_backward(self.n, &self.u, self.n, &mut x, ldb, nrhs);
        x
    }

    /// `A0 = P^T * L * U`, dense
    fn original(&self) -> Vec<f64> {
        let n = self.n;
        let mut lu = vec![0.0; n * n];
        for c in 0..n {
            for r in 0..n {
                lu[r + c * n] = (0..=r.min(c))
                    .map(|p| {
                        let l = if p == r { 1.0 } else { self.l_flat[r + p * n] };
                        l * self.u[p + c * n]
                    })
                    .sum();
            }
        }
        // Undo the interchanges in reverse order
        for (r, &p) in self.ipiv.iter().enumerate().rev() {
            for c in 0..n {
                lu.swap(r + c * n, p + c * n);
            }
        }
        lu
    }
}

#[test]
fn test_getrs_matches_reference() {
    common::init_tracing();
    let (n, nb, nrhs) = (17, 4, 5);
    let system = System::new(3, n, nb);
    let l = system.factor(nb);
    let mut rng = rng(30);
    let ldb = n + 1;
    let original = common::random_matrix(&mut rng, n, nrhs, ldb);
    let expected = system.reference(&original, ldb, nrhs);

    for cores in [1, 2, 3, 6] {
        for partition in [PartitionKind::Contiguous, PartitionKind::RoundRobin] {
            let engine = engine(cores, nb, partition);
            let mut b = original.clone();
            engine
                .getrs(n as isize, nrhs as isize, &system.u, n as isize, &l, &system.ipiv, &mut b, ldb as isize)
                .unwrap();
            assert_matrix_close(&b, &expected, n, nrhs, ldb);
        }
    }
}

#[test]
fn test_getrs_solves_original_system() {
    let (n, nb, nrhs) = (12, 3, 2);
    let system = System::new(9, n, nb);
    let a0 = system.original();
    let mut rng = rng(90);
    let x_true = common::random_matrix(&mut rng, n, nrhs, n);

    let mut b = vec![0.0; n * nrhs];
    for col in 0..nrhs {
        for r in 0..n {
            b[r + col * n] = (0..n).map(|c| a0[r + c * n] * x_true[c + col * n]).sum();
        }
    }

    let engine = engine(4, nb, PartitionKind::RoundRobin);
    engine
        .getrs(n as isize, nrhs as isize, &system.u, n as isize, &system.factor(nb), &system.ipiv, &mut b, n as isize)
        .unwrap();
    for (got, want) in b.iter().zip(&x_true) {
        common::assert_relative_eq!(*got, *want, epsilon = 1e-9, max_relative = 1e-9);
    }
}

#[test]
fn test_pool_reused_across_sizes() {
    let nb = 4;
    let engine = engine(3, nb, PartitionKind::Contiguous);
    let mut previous_capacity = 0;
    for (call, &(n, nrhs)) in [(8, 2), (16, 4), (5, 1), (16, 4), (20, 3)].iter().enumerate() {
        let system = System::new(call as u64, n, nb);
        let mut rng = rng(100 + call as u64);
        let original = common::random_matrix(&mut rng, n, nrhs, n);
        let mut b = original.clone();
        engine
            .getrs(n as isize, nrhs as isize, &system.u, n as isize, &system.factor(nb), &system.ipiv, &mut b, n as isize)
            .unwrap();
        assert_matrix_close(&b, &system.reference(&original, n, nrhs), n, nrhs, n);

        let stats = engine.stats();
        assert!(stats.tile_capacity >= previous_capacity);
        previous_capacity = stats.tile_capacity;
    }
    // Grows for 8, 16 and 20 only
    assert_eq!(engine.stats().tile_reallocations, 3);
    // Convert A, convert B, forward, backward, convert back
    assert_eq!(engine.phases_dispatched(), 5 * 5);
}

#[test]
fn test_shared_engine_serializes_calls() {
    let nb = 4;
    let engine = std::sync::Arc::new(
        EngineContext::<f64>::new(EngineConfig::default().with_cores(3).with_blocking(nb, 2)).unwrap(),
    );
    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let engine = std::sync::Arc::clone(&engine);
            std::thread::spawn(move || {
                let n = 10 + seed as usize;
                let system = System::new(seed, n, nb);
                let mut rng = rng(seed + 50);
                let original = common::random_matrix(&mut rng, n, 2, n);
                let mut b = original.clone();
                engine
                    .getrs(n as isize, 2, &system.u, n as isize, &system.factor(nb), &system.ipiv, &mut b, n as isize)
                    .unwrap();
                assert_matrix_close(&b, &system.reference(&original, n, 2), n, 2, n);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
