//! Scalar trait for tile storage and kernels
//!
//! Tiles live in zero-initialised scratch memory and are shared between worker
//! threads, so the element type must be plain-old-data and thread-safe in
//! addition to supporting floating-point arithmetic.

use bytemuck::Pod;
use num_traits::Float;
use std::fmt::Debug;
use std::ops::{AddAssign, SubAssign};

/// Floating-point element type usable in tiled operands
pub trait Scalar:
    Float + Pod + Default + Debug + Send + Sync + AddAssign + SubAssign + 'static
{
    /// Short precision name used in log output
    const PRECISION: &'static str;

    /// Convert from f64 (for creating constants)
    fn from_f64(val: f64) -> Self;

    /// Convert to f64 (for diagnostics and comparisons)
    fn as_f64(self) -> f64;
}

impl Scalar for f64 {
    const PRECISION: &'static str = "d";

    fn from_f64(val: f64) -> Self {
        val
    }

    fn as_f64(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    const PRECISION: &'static str = "s";

    fn from_f64(val: f64) -> Self {
        val as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}
