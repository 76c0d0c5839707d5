//! Engine object owning the worker pool and the scratch buffers
//!
//! An [`EngineContext`] replaces process-wide state: it owns one
//! [`WorkerPool`], one [`BufferPool`] and the tuner, and serialises driver
//! calls behind a mutex so it can be shared between threads with `Arc`.

use crate::pool::WorkerPool;
use crate::tune::{tuner_for, Blocking, BlockingTuner, FixedTuner};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tileflow_core::{BufferPool, EngineConfig, Error, PoolStats, Result, Scalar};
use tracing::info;

pub(crate) struct EngineState<T: Scalar> {
    pub(crate) config: EngineConfig,
    pub(crate) tuner: Box<dyn BlockingTuner>,
    pub(crate) pool: Option<WorkerPool>,
    pub(crate) buffers: BufferPool<T>,
    /// Inner block the engine was started with; `set_tile_size` clamps this
    configured_inner_block: usize,
    retired_phases: usize,
}

impl<T: Scalar> EngineState<T> {
    /// The pool, or the error a call on a shut-down engine reports
    pub(crate) fn pool_mut(&mut self) -> Result<&mut WorkerPool> {
        self.pool
            .as_mut()
            .ok_or_else(|| Error::NotInitialized("engine has been shut down".to_string()))
    }
}

/// Tile-parallel engine for precision `T`
pub struct EngineContext<T: Scalar> {
    state: Mutex<EngineState<T>>,
}

impl<T: Scalar> EngineContext<T> {
    /// Start an engine with the tuner implied by `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let tuner = tuner_for(&config)?;
        Self::with_tuner(config, tuner)
    }

    /// Start an engine with an explicit tuner
    pub fn with_tuner(config: EngineConfig, tuner: Box<dyn BlockingTuner>) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.cores, Arc::new(config.partition))?;
        let configured_inner_block = config.inner_block;
        info!(
            precision = T::PRECISION,
            cores = config.cores,
            tuner = tuner.name(),
            "engine initialized"
        );
        Ok(Self {
            state: Mutex::new(EngineState {
                config,
                tuner,
                pool: Some(pool),
                buffers: BufferPool::new(),
                configured_inner_block,
                retired_phases: 0,
            }),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState<T>> {
        // Driver panics happen before or after phases, never inside the lock-step protocol
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configuration the engine currently runs with
    pub fn config(&self) -> EngineConfig {
        self.lock().config.clone()
    }

    /// Threads taking part in each phase
    pub fn cores(&self) -> usize {
        self.lock().config.cores
    }

    /// Whether the worker pool is alive
    pub fn is_initialized(&self) -> bool {
        self.lock().pool.is_some()
    }

    /// Fix the tile size used by subsequent calls and turn autotuning off
    ///
    /// The inner block is the one the engine was started with, clamped to
    /// the new tile size.
    pub fn set_tile_size(&self, nb: usize) -> Result<()> {
        let mut state = self.lock();
        state.pool_mut()?;
        if nb == 0 {
            return Err(Error::illegal(1, "nb", "tile size must be positive"));
        }
        if !Blocking::tile_fits(nb) {
            return Err(Error::illegal(1, "nb", format!("a {nb}x{nb} tile cannot be addressed")));
        }
        let ib = state.configured_inner_block.min(nb);
        state.tuner = Box::new(FixedTuner::new(Blocking::new(nb, ib)?));
        state.config.tile_size = nb;
        state.config.inner_block = ib;
        state.config.autotune = false;
        Ok(())
    }

    /// Tile size set in the configuration
    pub fn tile_size(&self) -> usize {
        self.lock().config.tile_size
    }

    /// Blocking a driver call of this shape will use
    ///
    /// Factors passed to the solve drivers must be tiled with this `nb`.
    pub fn blocking_for(&self, m: usize, n: usize, nrhs: usize) -> Blocking {
        self.lock().tuner.blocking(m, n, nrhs)
    }

    /// Scratch usage counters
    pub fn stats(&self) -> PoolStats {
        self.lock().buffers.stats()
    }

    /// Phases run by the worker pool so far
    pub fn phases_dispatched(&self) -> usize {
        let state = self.lock();
        state.retired_phases + state.pool.as_ref().map_or(0, WorkerPool::phases_dispatched)
    }

    /// Stop the worker threads; later driver calls report `NotInitialized`
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if let Some(mut pool) = state.pool.take() {
            pool.shutdown();
            state.retired_phases += pool.phases_dispatched();
        }
    }
}

impl<T: Scalar> std::fmt::Debug for EngineContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("EngineContext")
            .field("precision", &T::PRECISION)
            .field("config", &state.config)
            .field("tuner", &state.tuner.name())
            .field("initialized", &state.pool.is_some())
            .finish()
    }
}
