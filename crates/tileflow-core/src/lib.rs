//! Core types for tile-parallel dense linear algebra
//!
//! This crate holds everything a tiled driver needs that does not involve
//! threads: tile-grid descriptors, conversion between flat column-major
//! (LAPACK) storage and blocked tile layout, the scratch buffers reused across
//! calls, and the progress table that gates cross-tile dependencies.
//!
//! # Example
//!
//! ```rust
//! use tileflow_core::{MatrixDescriptor, TileLayout};
//!
//! // A 5x3 matrix with leading dimension 6, split into 2x2 tiles
//! let desc = MatrixDescriptor::new(5, 3, 2).unwrap();
//! let layout = TileLayout::new(desc, 6).unwrap();
//!
//! let flat: Vec<f64> = (0..18).map(|x| x as f64).collect();
//! let mut tiled = vec![0.0; desc.tiled_len()];
//! layout.to_tiled(&flat, &mut tiled).unwrap();
//!
//! let mut back = vec![0.0; 18];
//! layout.from_tiled(&tiled, &mut back).unwrap();
//! assert_eq!(back[4 + 2 * 6], flat[4 + 2 * 6]);
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod factor;
pub mod layout;
pub mod numeric;
pub mod progress;
pub mod shared;
pub mod workspace;

pub use config::{EngineConfig, PartitionKind, DEFAULT_INNER_BLOCK, DEFAULT_TILE_SIZE};
pub use descriptor::{ceil_div, ArenaPlan, MatrixDescriptor};
pub use error::{status_of, Error, Result};
pub use factor::TiledFactor;
pub use layout::{checked_flat_len, flat_len, TileLayout};
pub use numeric::Scalar;
pub use progress::{Backoff, ProgressTable, NOT_PRODUCED};
pub use shared::SharedSlice;
pub use workspace::{AlignedBuffer, BufferPool, PoolStats, TILE_ALIGNMENT};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EngineConfig, MatrixDescriptor, PartitionKind, Result, Scalar, TileLayout, TiledFactor,
    };

    pub use crate::error::Error;
}
