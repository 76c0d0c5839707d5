//! Fixed pool of long-lived worker threads driven in lock-step
//!
//! The calling thread is rank 0 and takes part in every phase; ranks
//! `1..cores` are spawned once and live until shutdown. A phase is run as
//!
//! - coordinator: publish action, arrive (acknowledge), reset to `StandBy`,
//!   run the rank-0 share, arrive (done)
//! - worker: wait for an action, arrive, run its share, arrive
//!
//! so the action is reset before any worker can look at it again, and the
//! done barrier orders every tile written in one phase before the next.

use crate::barrier::Barrier;
use crate::dispatch::{Action, ActionDispatcher, JobHandle};
use crate::job::{execute, PhaseJob, WorkerShare};
use crate::partition::PartitionStrategy;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tileflow_core::{Error, Result};
use tracing::{debug, info, trace};

/// State every participant holds a reference to
#[derive(Debug)]
pub struct PoolSignals {
    pub dispatcher: ActionDispatcher,
    pub barrier: Barrier,
}

/// Arrives at the done barrier when dropped, also while unwinding, so the
/// job outlives every worker still using it.
struct DoneArrival<'a> {
    barrier: &'a Barrier,
}

impl Drop for DoneArrival<'_> {
    fn drop(&mut self) {
        self.barrier.arrive(0);
    }
}

/// Lock-step thread pool
#[derive(Debug)]
pub struct WorkerPool {
    signals: Arc<PoolSignals>,
    partition: Arc<dyn PartitionStrategy>,
    workers: Vec<JoinHandle<()>>,
    cores: usize,
    phases_dispatched: usize,
    running: bool,
}

impl WorkerPool {
    /// Start `cores - 1` worker threads
    pub fn new(cores: usize, partition: Arc<dyn PartitionStrategy>) -> Result<Self> {
        if cores == 0 {
            return Err(Error::InvalidConfig("pool needs at least one core".to_string()));
        }
        let signals = Arc::new(PoolSignals {
            dispatcher: ActionDispatcher::new(),
            barrier: Barrier::new(cores),
        });
        let mut pool = Self {
            signals,
            partition,
            workers: Vec::with_capacity(cores - 1),
            cores,
            phases_dispatched: 0,
            running: true,
        };

        for rank in 1..cores {
            let signals = Arc::clone(&pool.signals);
            let partition = Arc::clone(&pool.partition);
            let spawned = thread::Builder::new()
                .name(format!("tileflow-worker-{rank}"))
                .spawn(move || worker_loop(rank, cores, &signals, partition.as_ref()));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(err) => {
                    debug!(rank, error = %err, "worker spawn failed");
                    // The barrier expects `cores` threads; release the ones already
                    // running without it.
                    pool.abandon();
                    return Err(Error::out_of_resources("worker threads", cores - 1));
                }
            }
        }

        info!(cores, partition = pool.partition.name(), "worker pool started");
        Ok(pool)
    }

    /// Threads taking part in each phase
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Partition used to split work
    pub fn partition(&self) -> &dyn PartitionStrategy {
        self.partition.as_ref()
    }

    /// Phases run so far
    pub fn phases_dispatched(&self) -> usize {
        self.phases_dispatched
    }

    /// Whether the workers are still alive
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Rendezvous completed so far (two per phase)
    pub fn barrier_generation(&self) -> u64 {
        self.signals.barrier.generation()
    }

    /// Run one phase on every participant and return once all shares are done
    pub fn run_phase(&mut self, action: Action, job: &dyn PhaseJob) -> Result<()> {
        if !self.running {
            return Err(Error::NotInitialized("worker pool has been shut down".to_string()));
        }
        if matches!(action, Action::StandBy | Action::Shutdown) {
            return Err(Error::Other(anyhow::anyhow!(
                "{} is not a phase",
                action.name()
            )));
        }
        trace!(action = action.name(), cores = self.cores, "dispatching phase");

        let signals = &self.signals;
        signals.dispatcher.set_action(action, Some(JobHandle::new(job)));
        signals.barrier.arrive(0);
        signals.dispatcher.reset();
        {
            let _done = DoneArrival {
                barrier: &signals.barrier,
            };
            let share = WorkerShare::new(0, self.cores, self.partition.as_ref());
            execute(action, job, &share);
        }
        self.phases_dispatched += 1;
        Ok(())
    }

    /// Stop and join every worker
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.signals.dispatcher.set_action(Action::Shutdown, None);
        self.signals.barrier.arrive(0);
        self.signals.dispatcher.reset();
        self.join_all();
        self.running = false;
        info!(phases = self.phases_dispatched, "worker pool shut down");
    }

    fn abandon(&mut self) {
        // Ranks that never started are counted in so the ones that did can
        // acknowledge the shutdown.
        let missing = self.cores - 1 - self.workers.len();
        self.signals.dispatcher.set_action(Action::Shutdown, None);
        self.signals.barrier.arrive_absent(missing);
        self.signals.barrier.arrive(0);
        self.join_all();
        self.running = false;
    }

    fn join_all(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                debug!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rank: usize, cores: usize, signals: &PoolSignals, partition: &dyn PartitionStrategy) {
    trace!(rank, "worker started");
    let share = WorkerShare::new(rank, cores, partition);
    loop {
        let (action, job) = signals.dispatcher.wait_for_action();
        signals.barrier.arrive(rank);
        if action == Action::Shutdown {
            break;
        }
        if let Some(job) = job {
            trace!(rank, action = action.name(), "running share");
            // Safety: the coordinator keeps the job alive until the done barrier
            execute(action, unsafe { job.get() }, &share);
        }
        signals.barrier.arrive(rank);
    }
    trace!(rank, "worker exiting");
}
