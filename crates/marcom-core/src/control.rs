//! Pause control shared between a running simulation and the service layer.
//!
//! The engine owns the simulation behind a lock while a stream drives it,
//! so the pause flag lives outside that lock in an atomic: a pause request
//! never waits for the current turn to finish.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared pause state for one simulation.
#[derive(Debug, Default)]
pub struct SimulationControl {
    /// Whether the simulation is currently paused.
    paused: AtomicBool,
}

impl SimulationControl {
    /// Create a running (unpaused) control.
    pub const fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
        }
    }

    /// Check whether the simulation is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the simulation. Takes effect at the next turn boundary.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the simulation.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }
}
