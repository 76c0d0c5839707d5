//! Engine configuration
//!
//! Settings are plain serialisable data so they can be stored alongside
//! benchmark results or loaded from a file; environment overrides follow the
//! `TILEFLOW_*` naming.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default tile edge length
pub const DEFAULT_TILE_SIZE: usize = 128;
/// Default inner blocking size
pub const DEFAULT_INNER_BLOCK: usize = 32;

/// Static assignment of tiles to threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    /// Each thread takes one contiguous run of tile indices
    #[default]
    Contiguous,
    /// Tile indices are dealt to threads in turn
    RoundRobin,
}

impl PartitionKind {
    /// Get the name of this partition
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contiguous => "contiguous",
            Self::RoundRobin => "round_robin",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "contiguous" => Ok(Self::Contiguous),
            "round_robin" | "round-robin" | "roundrobin" => Ok(Self::RoundRobin),
            other => Err(Error::InvalidConfig(format!("unknown partition '{other}'"))),
        }
    }
}

/// Configuration of a tiled engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Threads taking part in each phase, the calling thread included
    pub cores: usize,
    /// Tile edge length used when autotuning is off
    pub tile_size: usize,
    /// Inner blocking size used when autotuning is off
    pub inner_block: usize,
    /// Tile-to-thread assignment
    pub partition: PartitionKind,
    /// Let the tuner pick blocking sizes per problem
    pub autotune: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cores: num_cpus::get().max(1),
            tile_size: DEFAULT_TILE_SIZE,
            inner_block: DEFAULT_INNER_BLOCK,
            partition: PartitionKind::default(),
            autotune: true,
        }
    }
}

impl EngineConfig {
    /// Set the thread count
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    /// Fix the blocking sizes and turn autotuning off
    pub fn with_blocking(mut self, tile_size: usize, inner_block: usize) -> Self {
        self.tile_size = tile_size;
        self.inner_block = inner_block;
        self.autotune = false;
        self
    }

    /// Set the partition
    pub fn with_partition(mut self, partition: PartitionKind) -> Self {
        self.partition = partition;
        self
    }

    /// Enable or disable autotuning
    pub fn with_autotune(mut self, autotune: bool) -> Self {
        self.autotune = autotune;
        self
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cores == 0 {
            return Err(Error::InvalidConfig("cores must be at least 1".to_string()));
        }
        if self.tile_size == 0 {
            return Err(Error::InvalidConfig("tile_size must be at least 1".to_string()));
        }
        if self.tile_size.checked_mul(self.tile_size).is_none() {
            return Err(Error::InvalidConfig(format!(
                "tile_size {} is too large to address one tile",
                self.tile_size
            )));
        }
        if self.inner_block == 0 || self.inner_block > self.tile_size {
            return Err(Error::InvalidConfig(format!(
                "inner_block must be in [1, {}], got {}",
                self.tile_size, self.inner_block
            )));
        }
        Ok(())
    }

    /// Apply `TILEFLOW_*` overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("TILEFLOW_CORES") {
            config.cores = parse_usize("TILEFLOW_CORES", &value)?;
        }
        if let Some(value) = lookup("TILEFLOW_TILE_SIZE") {
            config.tile_size = parse_usize("TILEFLOW_TILE_SIZE", &value)?;
            config.autotune = false;
        }
        if let Some(value) = lookup("TILEFLOW_INNER_BLOCK") {
            config.inner_block = parse_usize("TILEFLOW_INNER_BLOCK", &value)?;
        }
        if let Some(value) = lookup("TILEFLOW_PARTITION") {
            config.partition = PartitionKind::parse(&value)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{key} must be a non-negative integer, got '{value}'")))
}
