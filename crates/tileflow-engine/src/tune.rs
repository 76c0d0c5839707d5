//! Choice of tile size and inner blocking per problem

use std::fmt::Debug;
use tileflow_core::{EngineConfig, Error, Result};

/// Tile edge length `nb` and inner blocking size `ib`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocking {
    pub nb: usize,
    pub ib: usize,
}

impl Blocking {
    /// Create a blocking, rejecting sizes the kernels cannot run with
    pub fn new(nb: usize, ib: usize) -> Result<Self> {
        if nb == 0 || ib == 0 || ib > nb {
            return Err(Error::InvalidConfig(format!(
                "blocking needs 1 <= ib <= nb, got nb = {nb}, ib = {ib}"
            )));
        }
        if !Self::tile_fits(nb) {
            return Err(Error::InvalidConfig(format!(
                "a {nb}x{nb} tile cannot be addressed"
            )));
        }
        Ok(Self { nb, ib })
    }

    /// Whether an `nb x nb` tile slot has an addressable element count
    pub fn tile_fits(nb: usize) -> bool {
        nb.checked_mul(nb).is_some()
    }
}

/// Picks the blocking used for a call
///
/// The drivers treat the answer as authoritative and derive every tile count
/// from it.
pub trait BlockingTuner: Send + Sync + Debug {
    fn blocking(&self, m: usize, n: usize, nrhs: usize) -> Blocking;

    /// Get the name of this tuner
    fn name(&self) -> &'static str;
}

/// Always answers with the same blocking
#[derive(Debug, Clone, Copy)]
pub struct FixedTuner {
    blocking: Blocking,
}

impl FixedTuner {
    pub fn new(blocking: Blocking) -> Self {
        Self { blocking }
    }

    /// Use the configured tile size and inner block
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(Blocking::new(config.tile_size, config.inner_block)?))
    }
}

impl BlockingTuner for FixedTuner {
    fn blocking(&self, _m: usize, _n: usize, _nrhs: usize) -> Blocking {
        self.blocking
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Picks the tile size from the problem size
///
/// Small problems get small tiles so that there are enough of them to keep
/// every core busy.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTuner {
    cores: usize,
}

impl HeuristicTuner {
    /// `(largest dimension, nb, ib)` rows, smallest first
    const TABLE: [(usize, usize, usize); 4] = [
        (256, 32, 8),
        (1024, 64, 16),
        (4096, 128, 32),
        (usize::MAX, 192, 48),
    ];

    pub fn new(cores: usize) -> Self {
        Self {
            cores: cores.max(1),
        }
    }
}

impl BlockingTuner for HeuristicTuner {
    /// Never answers with tiles larger than the problem
    fn blocking(&self, m: usize, n: usize, nrhs: usize) -> Blocking {
        let size = m.max(n);
        let mut row = Self::TABLE
            .iter()
            .position(|&(limit, _, _)| size <= limit)
            .unwrap_or(Self::TABLE.len() - 1);
        // Step down while the grid is too coarse for the available cores
        while row > 0 {
            let nb = Self::TABLE[row].1;
            let tiles = size.div_ceil(nb) * nrhs.max(1).div_ceil(nb);
            if tiles >= self.cores {
                break;
            }
            row -= 1;
        }
        let (_, nb, ib) = Self::TABLE[row];
        let nb = nb.min(size.max(1));
        Blocking { nb, ib: ib.min(nb) }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Tuner implied by a configuration
pub fn tuner_for(config: &EngineConfig) -> Result<Box<dyn BlockingTuner>> {
    if config.autotune {
        Ok(Box::new(HeuristicTuner::new(config.cores)))
    } else {
        Ok(Box::new(FixedTuner::from_config(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_validation() {
        assert!(Blocking::new(4, 4).is_ok());
        assert!(Blocking::new(4, 5).is_err());
        assert!(Blocking::new(0, 0).is_err());
    }

    #[test]
    fn test_blocking_rejects_unaddressable_tiles() {
        assert!(!Blocking::tile_fits(usize::MAX / 2));
        assert!(Blocking::tile_fits(1 << 10));
        assert!(Blocking::new(usize::MAX / 2, 1).is_err());
    }

    #[test]
    fn test_heuristic_clamps_to_problem() {
        let tuner = HeuristicTuner::new(1);
        assert_eq!(tuner.blocking(4, 4, 1), Blocking { nb: 4, ib: 4 });
        assert_eq!(tuner.blocking(20, 6, 3), Blocking { nb: 20, ib: 8 });
        assert_eq!(tuner.blocking(0, 0, 0), Blocking { nb: 1, ib: 1 });
        let tuner = HeuristicTuner::new(8);
        let blocking = tuner.blocking(3, 9, 2);
        assert!(blocking.nb <= 9);
        assert!(blocking.ib <= blocking.nb);
    }

    #[test]
    fn test_fixed_ignores_shape() {
        let tuner = FixedTuner::new(Blocking::new(8, 2).unwrap());
        assert_eq!(tuner.blocking(1, 1, 1), tuner.blocking(5000, 3000, 7));
        assert_eq!(tuner.blocking(3, 3, 3).nb, 8);
    }

    #[test]
    fn test_heuristic_grows_with_size() {
        let tuner = HeuristicTuner::new(1);
        assert_eq!(tuner.blocking(100, 100, 100).nb, 32);
        assert_eq!(tuner.blocking(1000, 1000, 1000).nb, 64);
        assert_eq!(tuner.blocking(3000, 3000, 3000).nb, 128);
        assert_eq!(tuner.blocking(10_000, 10_000, 10_000).nb, 192);
    }

    #[test]
    fn test_heuristic_refines_for_many_cores() {
        // 3000 x 1 gives 24 tiles at nb = 128; 64 cores want more
        let tuner = HeuristicTuner::new(64);
        let blocking = tuner.blocking(3000, 3000, 1);
        assert!(blocking.nb < 128);
        assert!(blocking.ib <= blocking.nb);
    }

    #[test]
    fn test_tuner_for_config() {
        let config = EngineConfig::default().with_blocking(16, 4);
        assert_eq!(tuner_for(&config).unwrap().name(), "fixed");
        let config = config.with_autotune(true);
        assert_eq!(tuner_for(&config).unwrap().name(), "heuristic");
    }
}
