//! Rendezvous point for every participant of a phase

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    arrived: usize,
    generation: u64,
}

/// Reusable generation-counting barrier
///
/// The pool passes it twice per phase: once to acknowledge the published
/// action and once when every share is finished. A participant that never
/// arrives stalls the rest; there is no timeout.
#[derive(Debug)]
pub struct Barrier {
    state: Mutex<State>,
    released: Condvar,
    participants: usize,
}

impl Barrier {
    /// Create a barrier for `participants` threads
    ///
    /// # Panics
    /// If `participants` is zero
    pub fn new(participants: usize) -> Self {
        assert!(participants > 0, "barrier needs at least one participant");
        Self {
            state: Mutex::new(State::default()),
            released: Condvar::new(),
            participants,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until all participants of the current generation have arrived
    ///
    /// Returns `true` on exactly one participant per generation, the one whose
    /// arrival released the others.
    pub fn arrive(&self, rank: usize) -> bool {
        debug_assert!(
            rank < self.participants,
            "rank {rank} outside cohort of {}",
            self.participants
        );
        let mut state = self.lock();
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.participants {
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.released.notify_all();
            return true;
        }
        while state.generation == generation {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        false
    }

    /// Count `count` participants that will never arrive as arrived
    pub(crate) fn arrive_absent(&self, count: usize) {
        let mut state = self.lock();
        state.arrived += count;
        if state.arrived >= self.participants {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
        }
    }

    /// Number of completed rendezvous
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Threads the barrier waits for
    pub fn participants(&self) -> usize {
        self.participants
    }
}
