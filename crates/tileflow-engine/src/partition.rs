//! Static assignment of linear work items to participants
//!
//! Results never depend on the strategy; only load balance does.

use std::fmt::Debug;
use tileflow_core::PartitionKind;

/// Maps work item `index` out of `count` to the rank that runs it
pub trait PartitionStrategy: Send + Sync + Debug {
    /// Rank in `0..cores` owning `index`
    fn owner(&self, index: usize, count: usize, cores: usize) -> usize;

    /// Get the name of this strategy
    fn name(&self) -> &'static str;
}

/// Each rank takes one contiguous run of indices
#[derive(Debug, Clone, Copy, Default)]
pub struct Contiguous;

impl PartitionStrategy for Contiguous {
    #[inline]
    fn owner(&self, index: usize, count: usize, cores: usize) -> usize {
        debug_assert!(index < count);
        index * cores / count
    }

    fn name(&self) -> &'static str {
        "contiguous"
    }
}

/// Indices are dealt to ranks in turn
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl PartitionStrategy for RoundRobin {
    #[inline]
    fn owner(&self, index: usize, _count: usize, cores: usize) -> usize {
        index % cores
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

impl PartitionStrategy for PartitionKind {
    #[inline]
    fn owner(&self, index: usize, count: usize, cores: usize) -> usize {
        match self {
            PartitionKind::Contiguous => Contiguous.owner(index, count, cores),
            PartitionKind::RoundRobin => RoundRobin.owner(index, count, cores),
        }
    }

    fn name(&self) -> &'static str {
        PartitionKind::name(self)
    }
}
