// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs one external command per call and settles a single
//! `Result` for it.
//!
//! - [`coordinator`] owns the event loop: spawn, output routing, cancellation
//!   and the single settlement.
//! - [`options`] is the type-state builder for per-call configuration.
//! - [`sink`] holds the per-stream policies (collect vs. forward to a handler).
//! - [`output`] defines the success payload and the failure taxonomy.
//! - [`backend`] provides the `ProcessBackend` trait, and [`tokio_backend`]
//!   the production implementation that tests can replace with a scripted one.

pub mod backend;
pub mod coordinator;
pub mod options;
pub mod output;
pub mod sink;
pub mod termination;
pub mod tokio_backend;

pub use backend::{KillSignal, ProcessBackend, ProcessControl, ProcessEvent, SpawnedProcess};
pub use coordinator::{AbortHandle, execute, execute_with};
pub use options::ExecOptions;
pub use output::{ExecError, ExecOutput};
pub use sink::{Collect, Forward, OutputSink, Streamed};
pub use termination::{ABORT_SIGNAL, Termination};
pub use tokio_backend::TokioBackend;
