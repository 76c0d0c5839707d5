//! Worker pool, phase dispatch and tiled solve drivers
//!
//! An [`EngineContext`] owns a fixed pool of worker threads and the scratch
//! buffers of `tileflow-core`. Driver calls run as a sequence of phases; in
//! each phase every thread, the caller included, executes its share of the
//! tiles and meets the others at a barrier. Cross-tile order inside a phase
//! comes from the progress table.
//!
//! # Example
//!
//! ```rust
//! use tileflow_core::{EngineConfig, TiledFactor};
//! use tileflow_engine::EngineContext;
//!
//! let engine = EngineContext::<f64>::new(EngineConfig::default().with_cores(2).with_blocking(2, 2)).unwrap();
//!
//! // Identity factor, natural pivots: B comes back unchanged
//! let (m, nrhs) = (4, 3);
//! let a = vec![0.0; m * m];
//! let l = TiledFactor::identity(m, m, engine.blocking_for(m, m, nrhs).nb).unwrap();
//! let ipiv: Vec<usize> = (0..m).collect();
//! let mut b: Vec<f64> = (0..m * nrhs).map(|x| x as f64).collect();
//!
//! engine
//!     .trsmpl(m as isize, m as isize, nrhs as isize, &a, m as isize, &l, &ipiv, &mut b, m as isize)
//!     .unwrap();
//! assert_eq!(b[5], 5.0);
//! ```

pub mod barrier;
pub mod context;
pub mod dispatch;
pub mod drivers;
pub mod job;
pub mod kernels;
pub mod partition;
pub mod phases;
pub mod pool;
pub mod tune;

pub use barrier::Barrier;
pub use context::EngineContext;
pub use dispatch::{Action, ActionDispatcher, JobHandle};
pub use job::{PhaseJob, WorkerShare};
pub use partition::{Contiguous, PartitionStrategy, RoundRobin};
pub use pool::WorkerPool;
pub use tune::{Blocking, BlockingTuner, FixedTuner, HeuristicTuner};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Blocking, BlockingTuner, EngineContext, PartitionStrategy};
}
