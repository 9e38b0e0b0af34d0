//! Engine lifecycle bookkeeping
//!
//! The status lives in a `watch` channel so checkpoints read it without
//! locking and callers can observe every transition. Each activation bumps a
//! generation number; a probe taken for one run stays inactive forever once
//! that run is stopped, even if a later run is started.

use crate::state::EngineStatus;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of the engine status together with the run it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Phase {
    pub status: EngineStatus,
    pub generation: u64,
}

/// Owns the engine status and the in-flight counters
#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<Phase>,
    batches: Counter,
    operations: Counter,
}

impl Lifecycle {
    /// Creates a lifecycle in the `Free` status
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::default());
        Self {
            phase,
            batches: Counter::new(),
            operations: Counter::new(),
        }
    }

    /// Current status
    pub fn status(&self) -> EngineStatus {
        self.phase.borrow().status
    }

    /// Subscribes to status transitions
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Moves `Free -> Active` atomically
    ///
    /// Returns the generation of the new run, or `None` if the engine was not free.
    pub fn try_activate(&self) -> Option<u64> {
        let mut generation = None;
        self.phase.send_if_modified(|phase| {
            if !phase.status.is_free() {
                return false;
            }
            phase.generation += 1;
            phase.status = EngineStatus::Active;
            generation = Some(phase.generation);
            true
        });
        generation
    }

    /// Moves to `Closing` from any status
    pub fn begin_closing(&self) {
        self.set_status(EngineStatus::Closing);
    }

    /// Moves to `Free` from any status
    pub fn settle_free(&self) {
        self.set_status(EngineStatus::Free);
    }

    fn set_status(&self, status: EngineStatus) {
        self.phase.send_if_modified(|phase| {
            if phase.status == status {
                return false;
            }
            phase.status = status;
            true
        });
    }

    /// Returns a probe that reports whether run `generation` is still active
    pub fn probe(&self, generation: u64) -> ActivityProbe {
        ActivityProbe {
            phase: self.phase.subscribe(),
            generation,
        }
    }

    /// Registers a running batch; the batch counts as in flight until the guard drops
    pub fn enter_batch(&self) -> InFlightGuard {
        self.batches.enter()
    }

    /// Registers a running crawl operation
    pub fn enter_operation(&self) -> InFlightGuard {
        self.operations.enter()
    }

    /// Number of crawl operations currently executing
    pub fn operations_in_flight(&self) -> usize {
        self.operations.get()
    }

    /// Waits until no batch and no crawl operation is in flight
    pub async fn drained(&self) {
        self.operations.zero().await;
        self.batches.zero().await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// The "is my run still active" check shared by every crawl checkpoint
#[derive(Debug, Clone)]
pub struct ActivityProbe {
    phase: watch::Receiver<Phase>,
    generation: u64,
}

impl ActivityProbe {
    /// True while the engine is `Active` in the probe's own run
    pub fn is_active(&self) -> bool {
        let phase = *self.phase.borrow();
        phase.status.is_active() && phase.generation == self.generation
    }

    /// Generation of the run this probe watches
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A counter of in-flight work that can be awaited down to zero
#[derive(Debug, Clone)]
struct Counter {
    value: Arc<watch::Sender<usize>>,
}

impl Counter {
    fn new() -> Self {
        let (value, _) = watch::channel(0);
        Self {
            value: Arc::new(value),
        }
    }

    fn enter(&self) -> InFlightGuard {
        self.value.send_modify(|n| *n += 1);
        InFlightGuard {
            value: Arc::clone(&self.value),
        }
    }

    fn get(&self) -> usize {
        *self.value.borrow()
    }

    async fn zero(&self) {
        let mut rx = self.value.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Marks one unit of work in flight; dropping it (even while unwinding) releases it
#[derive(Debug)]
pub struct InFlightGuard {
    value: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.value.send_modify(|n| *n = n.saturating_sub(1));
    }
}
