//! Per-phase work and the share of it each thread runs

use crate::dispatch::Action;
use crate::partition::PartitionStrategy;

/// Work published to the pool for one phase
///
/// A job implements the body of every action it supports; the others fall
/// back to doing nothing, so `StandBy` and unsupported actions are no-ops.
/// Each method runs once per participant with that participant's share and
/// must only write tiles the share owns.
pub trait PhaseJob: Sync {
    fn convert_to_tiled(&self, _share: &WorkerShare<'_>) {}

    fn convert_from_tiled(&self, _share: &WorkerShare<'_>) {}

    fn tiled_solve(&self, _share: &WorkerShare<'_>) {}

    fn tiled_back_solve(&self, _share: &WorkerShare<'_>) {}
}

/// Run the body of `job` that belongs to `action`
pub fn execute(action: Action, job: &dyn PhaseJob, share: &WorkerShare<'_>) {
    match action {
        Action::ConvertToTiled => job.convert_to_tiled(share),
        Action::ConvertFromTiled => job.convert_from_tiled(share),
        Action::TiledSolve => job.tiled_solve(share),
        Action::TiledBackSolve => job.tiled_back_solve(share),
        Action::StandBy | Action::Shutdown => {}
    }
}

/// Rank of one participant together with the partition that assigns its work
#[derive(Clone, Copy)]
pub struct WorkerShare<'a> {
    rank: usize,
    cores: usize,
    partition: &'a dyn PartitionStrategy,
}

impl<'a> WorkerShare<'a> {
    pub fn new(rank: usize, cores: usize, partition: &'a dyn PartitionStrategy) -> Self {
        debug_assert!(rank < cores, "rank {rank} outside cohort of {cores}");
        Self {
            rank,
            cores,
            partition,
        }
    }

    /// Rank of this participant, 0 being the calling thread
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of participants in the phase
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Whether linear work item `index` out of `count` belongs to this participant
    #[inline]
    pub fn owns(&self, index: usize, count: usize) -> bool {
        self.partition.owner(index, count, self.cores) == self.rank
    }

    /// Work items of this participant in ascending order
    pub fn indices(&self, count: usize) -> impl DoubleEndedIterator<Item = usize> + '_ {
        (0..count).filter(move |&index| self.owns(index, count))
    }
}

impl std::fmt::Debug for WorkerShare<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerShare")
            .field("rank", &self.rank)
            .field("cores", &self.cores)
            .field("partition", &self.partition.name())
            .finish()
    }
}
