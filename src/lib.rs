//! Tile-parallel dense linear algebra
//!
//! `tileflow` partitions matrices into square tiles, converts between flat
//! column-major (LAPACK) storage and blocked tile layout, and drives a fixed
//! pool of worker threads through the phases of tiled solve routines.
//!
//! # Crates
//!
//! - [`tileflow_core`]: descriptors, layout conversion, scratch buffers,
//!   progress table, configuration and errors
//! - [`tileflow_engine`]: action dispatcher, barrier, worker pool, tile
//!   kernels and the driver routines on [`EngineContext`]
//!
//! # Example
//!
//! ```rust
//! use tileflow::prelude::*;
//!
//! let engine = EngineContext::<f64>::new(EngineConfig::default().with_cores(2).with_blocking(4, 2))?;
//! let n = 4;
//! let a = vec![0.0; n * n];
//! let l = TiledFactor::identity(n, n, 4)?;
//! let ipiv: Vec<usize> = (0..n).collect();
//! let mut b = vec![1.0, 2.0, 3.0, 4.0];
//! engine.trsmpl(4, 4, 1, &a, 4, &l, &ipiv, &mut b, 4)?;
//! assert_eq!(b, vec![1.0, 2.0, 3.0, 4.0]);
//! # Ok::<(), tileflow::Error>(())
//! ```

pub use tileflow_core;
pub use tileflow_engine;

pub use tileflow_core::error;

pub use tileflow_core::{
    status_of, EngineConfig, Error, MatrixDescriptor, PartitionKind, PoolStats, Result, Scalar,
    TileLayout, TiledFactor,
};
pub use tileflow_engine::{
    Action, Blocking, BlockingTuner, Contiguous, EngineContext, FixedTuner, HeuristicTuner,
    PartitionStrategy, RoundRobin,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use tileflow_core::prelude::*;
    pub use tileflow_engine::prelude::*;
}
