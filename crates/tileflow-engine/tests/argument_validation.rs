//! Rejected calls leave every buffer untouched and wake no worker

mod common;

use common::engine;
use tileflow_core::error::{NOT_INITIALIZED, SUCCESS};
use tileflow_core::{status_of, MatrixDescriptor, PartitionKind, PoolStats, TiledFactor};

fn inputs(n: usize) -> (Vec<f64>, TiledFactor<f64>, Vec<usize>, Vec<f64>) {
    let a = vec![0.0; n * n];
    let l = TiledFactor::identity(n, n, 4).unwrap();
    let ipiv = (0..n).collect();
    let b = (0..n * 2).map(|x| x as f64 + 0.5).collect();
    (a, l, ipiv, b)
}

#[test]
fn test_negative_dimension_is_illegal_argument() {
    let engine = engine(4, 4, PartitionKind::Contiguous);
    let (a, l, ipiv, original) = inputs(8);

    for (m, n, nrhs, expected) in [(-1, 8, 2, -1), (8, -1, 2, -2), (8, 8, -5, -3)] {
        let mut b = original.clone();
        let result = engine.trsmpl(m, n, nrhs, &a, 8, &l, &ipiv, &mut b, 8);
        assert_eq!(status_of(&result), expected);
        assert!(result.unwrap_err().is_illegal_argument());
        assert_eq!(b, original);
    }

    // Nothing was allocated and no phase was dispatched
    assert_eq!(engine.stats(), PoolStats::default());
    assert_eq!(engine.phases_dispatched(), 0);
}

#[test]
fn test_leading_dimensions_checked() {
    let engine = engine(2, 4, PartitionKind::Contiguous);
    let (a, l, ipiv, original) = inputs(8);
    let mut b = original.clone();

    let status = status_of(&engine.trsmpl(8, 8, 2, &a, 7, &l, &ipiv, &mut b, 8));
    assert_eq!(status, -5);
    let status = status_of(&engine.trsmpl(8, 8, 2, &a, 8, &l, &ipiv, &mut b, 0));
    assert_eq!(status, -9);
    let status = status_of(&engine.getrs(8, 2, &a, 8, &l, &ipiv, &mut b, -8));
    assert_eq!(status, -8);
    let status = status_of(&engine.getrs(8, 2, &a[..60], 8, &l, &ipiv, &mut b, 8));
    assert_eq!(status, -3);

    assert_eq!(b, original);
    assert_eq!(engine.phases_dispatched(), 0);
}

#[test]
fn test_empty_problem_returns_quickly() {
    let engine = engine(2, 4, PartitionKind::Contiguous);
    let l = TiledFactor::identity(0, 0, 4).unwrap();
    let mut b: Vec<f64> = Vec::new();
    let result = engine.trsmpl(0, 0, 0, &[], 1, &l, &[], &mut b, 1);
    assert_eq!(status_of(&result), SUCCESS);

    let mut b = vec![3.0; 4];
    let result = engine.trsmpl(4, 4, 0, &[0.0; 16], 4, &l, &[], &mut b, 4);
    assert_eq!(status_of(&result), SUCCESS);
    assert_eq!(b, vec![3.0; 4]);
    assert_eq!(engine.phases_dispatched(), 0);
}

#[test]
fn test_calls_after_shutdown_report_not_initialized() {
    let engine = engine(3, 4, PartitionKind::RoundRobin);
    let (a, l, ipiv, original) = inputs(8);
    let mut b = original.clone();
    engine.trsmpl(8, 8, 2, &a, 8, &l, &ipiv, &mut b, 8).unwrap();
    let phases = engine.phases_dispatched();

    engine.shutdown();
    let mut b = original.clone();
    // Not-initialized wins over argument errors
    let result = engine.trsmpl(-1, 8, 2, &a, 8, &l, &ipiv, &mut b, 8);
    assert_eq!(status_of(&result), NOT_INITIALIZED);
    let result = engine.getrs(8, 2, &a, 8, &l, &ipiv, &mut b, 8);
    assert_eq!(status_of(&result), NOT_INITIALIZED);
    assert_eq!(b, original);
    assert_eq!(engine.phases_dispatched(), phases);
}

#[test]
fn test_unaddressable_leading_dimension_is_illegal_argument() {
    let engine = engine(3, 4, PartitionKind::Contiguous);
    let a = vec![1.0; 6];
    let l = TiledFactor::identity(2, 2, 4).unwrap();
    let original = vec![2.0, 3.0, 4.0];
    let mut b = original.clone();

    let result = engine.trsmpl(2, 3, 1, &a, isize::MAX, &l, &[0, 1], &mut b, 3);
    assert_eq!(status_of(&result), -5);
    let result = engine.trsmpl(2, 3, 1, &a, isize::MAX / 2, &l, &[0, 1], &mut b, 3);
    assert_eq!(status_of(&result), -4);
    let result = engine.trsmpl(2, 3, 3, &a, 2, &l, &[0, 1], &mut b, isize::MAX);
    assert_eq!(status_of(&result), -9);
    assert_eq!(b, original);

    // The pool is still usable afterwards
    let mut b = vec![1.0, 2.0, 0.0];
    engine.trsmpl(2, 2, 1, &a[..4], 2, &l, &[0, 1], &mut b, 3).unwrap();
    assert_eq!(b, vec![1.0, 2.0, 0.0]);
    assert_eq!(engine.phases_dispatched(), 4);
}

#[test]
fn test_unaddressable_descriptor_offset_rejected() {
    let engine = engine(2, 2, PartitionKind::RoundRobin);
    let desc = MatrixDescriptor::new(4, 4, 2).unwrap().with_offset(usize::MAX - 8);
    let flat = vec![0.0; 16];
    let mut tiles = vec![0.0; 32];

    let err = engine.lapack_to_tile(&flat, 4, &desc, &mut tiles).unwrap_err();
    assert_eq!(err.status_code(), -3);
    let mut out = vec![0.0; 16];
    let err = engine.tile_to_lapack(&tiles, &desc, &mut out, 4).unwrap_err();
    assert_eq!(err.status_code(), -2);
    assert_eq!(engine.phases_dispatched(), 0);
}
