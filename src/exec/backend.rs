// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The coordinator talks to a `ProcessBackend` instead of
//! `tokio::process::Command` directly. This keeps the settlement logic
//! independent of the OS primitive and lets tests swap in a scripted backend
//! that emits exactly the events they want (including events that arrive
//! after the process already closed).
//!
//! - [`TokioBackend`](super::tokio_backend::TokioBackend) is the production
//!   implementation.
//! - `procexec-test-utils` provides `ScriptedBackend` for tests.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::termination::Termination;

/// Signals the coordinator may send to a running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    /// Soft terminate (`SIGTERM`). The process may catch it.
    Terminate,
    /// Forced abort (`SIGKILL`). Ends the process unconditionally.
    Kill,
}

impl KillSignal {
    pub fn name(self) -> &'static str {
        match self {
            KillSignal::Terminate => "SIGTERM",
            KillSignal::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events emitted by a spawned process, in delivery order.
///
/// A backend must emit every output chunk of a pipe before `Closed`, and emit
/// at most one of `Closed` / `Error` as the terminal event. Anything sent after
/// the terminal event is ignored by the coordinator.
#[derive(Debug)]
pub enum ProcessEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    /// Both pipes reached EOF and the process was reaped.
    Closed(Termination),
    /// The process could not be observed any further.
    Error(io::Error),
}

/// Kill capability for one spawned process.
pub trait ProcessControl: Send + Sync {
    /// Ask the backend to deliver `signal` to the process.
    ///
    /// Returns `false` if the process is already gone and the request could
    /// not be forwarded.
    fn kill(&self, signal: KillSignal) -> bool;
}

/// Handles produced by a successful spawn.
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub events: mpsc::Receiver<ProcessEvent>,
    pub control: Arc<dyn ProcessControl>,
}

impl SpawnedProcess {
    pub fn new(
        pid: Option<u32>,
        events: mpsc::Receiver<ProcessEvent>,
        control: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            pid,
            events,
            control,
        }
    }
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how processes are created.
///
/// Production code uses `TokioBackend`; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessBackend: Send + Sync {
    /// Start `command` with `args`, stdin disabled and both output pipes
    /// captured.
    ///
    /// An `Err` here is a spawn-level failure (e.g. missing executable).
    fn spawn(&self, command: &str, args: &[String]) -> io::Result<SpawnedProcess>;
}
