// packages/recorder/src/recording/lifecycle.rs
//! Lifecycle states and the pre-start gate
//!
//! The gate is a one-shot signal: the consumer thread blocks on it right after
//! spawning, and the controller either opens it (start) or drops it (teardown
//! before start). Either way it fires at most once.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Created, no queue bound, no thread
    Uninitialized,

    /// Queue bound, consumer parked at the gate, no writer
    ArmedWaitingStart,

    /// Writer open, consumer still parked at the gate
    Configured,

    /// Gate released, consumer draining the queue
    Running,

    /// Consumer joined, writer closed
    Stopped,
}

impl LifecycleState {
    /// Whether the consumer thread exists and has not been joined
    pub fn has_consumer(&self) -> bool {
        matches!(
            self,
            LifecycleState::ArmedWaitingStart | LifecycleState::Configured | LifecycleState::Running
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "Uninitialized",
            LifecycleState::ArmedWaitingStart => "ArmedWaitingStart",
            LifecycleState::Configured => "Configured",
            LifecycleState::Running => "Running",
            LifecycleState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// How the consumer left the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Started,
    Aborted,
}

/// Controller side of the gate
pub struct StartGate {
    release: Option<Sender<()>>,
}

/// Consumer side of the gate
pub struct GateWaiter {
    signal: Receiver<()>,
}

/// Create a closed gate
pub fn start_gate() -> (StartGate, GateWaiter) {
    let (release, signal) = bounded(1);
    (
        StartGate {
            release: Some(release),
        },
        GateWaiter { signal },
    )
}

impl StartGate {
    /// Let the consumer through. Returns false if the gate already fired or the
    /// consumer is gone.
    pub fn open(&mut self) -> bool {
        match self.release.take() {
            Some(release) => release.send(()).is_ok(),
            None => false,
        }
    }

    /// Release the consumer without starting it
    pub fn abort(&mut self) {
        self.release.take();
    }
}

impl GateWaiter {
    /// Block until the gate is opened or aborted
    pub fn wait(self) -> GateOutcome {
        match self.signal.recv() {
            Ok(()) => GateOutcome::Started,
            Err(_) => GateOutcome::Aborted,
        }
    }
}
