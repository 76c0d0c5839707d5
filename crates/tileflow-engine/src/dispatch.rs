//! The shared "current action" signal
//!
//! One coordinating thread publishes the next phase with
//! [`ActionDispatcher::set_action`]; every worker blocked in
//! [`ActionDispatcher::wait_for_action`] wakes up and reads the same value.
//! The dispatcher carries no per-worker parameters: each worker derives its
//! share from its own rank and the job published alongside the action.

use crate::job::PhaseJob;
use std::ptr::NonNull;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Phase the pool is asked to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing to do; workers keep waiting
    StandBy,
    /// Copy a flat operand into blocked layout
    ConvertToTiled,
    /// Copy a blocked operand back into flat layout
    ConvertFromTiled,
    /// Tiled forward substitution
    TiledSolve,
    /// Tiled backward substitution
    TiledBackSolve,
    /// Leave the worker loop
    Shutdown,
}

impl Action {
    /// Get the name of this action
    pub fn name(&self) -> &'static str {
        match self {
            Self::StandBy => "stand_by",
            Self::ConvertToTiled => "convert_to_tiled",
            Self::ConvertFromTiled => "convert_from_tiled",
            Self::TiledSolve => "tiled_solve",
            Self::TiledBackSolve => "tiled_back_solve",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Lifetime-erased reference to the job of the current phase
///
/// The coordinator keeps the job alive until every participant has passed the
/// end-of-phase barrier, which is the only window in which workers use it.
#[derive(Clone, Copy)]
pub struct JobHandle {
    job: NonNull<dyn PhaseJob>,
}

// Safety: PhaseJob requires Sync, and the handle is only dereferenced while
// the coordinator holds the job borrowed.
unsafe impl Send for JobHandle {}

impl JobHandle {
    pub fn new<'a>(job: &'a (dyn PhaseJob + 'a)) -> Self {
        // Safety: only the lifetime is changed; see `get` for the contract
        let job: &'static (dyn PhaseJob + 'static) = unsafe { std::mem::transmute(job) };
        Self {
            job: NonNull::from(job),
        }
    }

    /// Borrow the job
    ///
    /// # Safety
    /// The job this handle was created from must still be alive, i.e. the
    /// phase it was published for has not finished.
    pub unsafe fn get<'a>(&self) -> &'a dyn PhaseJob {
        self.job.as_ref()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job", &self.job.as_ptr())
            .finish()
    }
}

#[derive(Debug)]
struct Slot {
    action: Action,
    job: Option<JobHandle>,
}

/// Mutex and condition variable guarding the current action
#[derive(Debug)]
pub struct ActionDispatcher {
    slot: Mutex<Slot>,
    wake: Condvar,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionDispatcher {
    /// Create a dispatcher in `StandBy`
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                action: Action::StandBy,
                job: None,
            }),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicking participant already stalls the pool; keep the slot usable
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `action` and wake every waiting worker
    pub fn set_action(&self, action: Action, job: Option<JobHandle>) {
        let mut slot = self.lock();
        slot.action = action;
        slot.job = job;
        trace!(action = action.name(), "action published");
        self.wake.notify_all();
    }

    /// Block until the current action is something other than `StandBy`
    pub fn wait_for_action(&self) -> (Action, Option<JobHandle>) {
        let mut slot = self.lock();
        while slot.action == Action::StandBy {
            slot = self
                .wake
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        (slot.action, slot.job)
    }

    /// Go back to `StandBy` and drop the published job
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.action = Action::StandBy;
        slot.job = None;
    }

    /// The action currently published
    pub fn current(&self) -> Action {
        self.lock().action
    }
}
