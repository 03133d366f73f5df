// src/exec/coordinator.rs

//! The process execution coordinator.
//!
//! One call = one process. The coordinator multiplexes the process event
//! channel and the cancellation token in a single `select!` loop, so at most
//! one event is handled at a time and handlers run inline, in delivery order.
//! The loop ends with exactly one [`Settlement`]; all listeners are torn down
//! before the result is built.

use std::fmt;
use std::future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};

use super::backend::{KillSignal, ProcessBackend, ProcessControl, ProcessEvent, SpawnedProcess};
use super::options::ExecOptions;
use super::output::{ExecError, ExecOutput};
use super::sink::OutputSink;
use super::termination::Termination;
use super::tokio_backend::TokioBackend;

/// Lets a handler end the process it is reading from.
///
/// Handlers receive it by reference on every chunk. `abort()` sends the
/// forced signal (`SIGKILL`); the result then surfaces as an ordinary
/// signal-terminated failure once the process closes.
pub struct AbortHandle {
    control: Option<Arc<dyn ProcessControl>>,
    pid: Option<u32>,
}

impl AbortHandle {
    fn new(control: Arc<dyn ProcessControl>, pid: Option<u32>) -> Self {
        Self {
            control: Some(control),
            pid,
        }
    }

    /// A handle bound to no process; `abort()` does nothing.
    pub fn detached() -> Self {
        Self {
            control: None,
            pid: None,
        }
    }

    pub fn abort(&self) {
        let Some(control) = &self.control else {
            debug!("abort requested on a detached handle");
            return;
        };
        if control.kill(KillSignal::Kill) {
            info!(pid = ?self.pid, "abort requested by output handler");
        } else {
            debug!(pid = ?self.pid, "abort requested but process already gone");
        }
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("pid", &self.pid)
            .field("attached", &self.control.is_some())
            .finish()
    }
}

/// Every subscription held by one invocation.
///
/// Dropped without `teardown()` means the caller dropped the future before it
/// settled; the process is then killed so it cannot outlive the invocation.
struct Listeners {
    events: mpsc::Receiver<ProcessEvent>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    control: Arc<dyn ProcessControl>,
    abort: AbortHandle,
    settled: bool,
}

enum Wake {
    Cancelled,
    Event(Option<ProcessEvent>),
}

impl Listeners {
    fn attach(process: SpawnedProcess, signal: Option<CancellationToken>) -> Self {
        let SpawnedProcess {
            pid,
            events,
            control,
        } = process;

        Self {
            events,
            cancelled: signal.map(|token| Box::pin(token.cancelled_owned())),
            abort: AbortHandle::new(Arc::clone(&control), pid),
            control,
            settled: false,
        }
    }

    /// Wait for the next thing that needs handling. Cancellation is checked
    /// first so a pending close cannot hide it.
    async fn next(&mut self) -> Wake {
        let Self {
            events, cancelled, ..
        } = self;

        let cancellation = async {
            match cancelled.as_mut() {
                Some(fut) => fut.as_mut().await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancellation => Wake::Cancelled,
            event = events.recv() => Wake::Event(event),
        }
    }

    /// Detach everything. Consumes the set, so it runs once per invocation.
    fn teardown(mut self) {
        self.settled = true;
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        self.events.close();
        if !self.settled {
            warn!(pid = ?self.abort.pid, "execution dropped before settlement; killing process");
            if !self.control.kill(KillSignal::Kill) {
                debug!(pid = ?self.abort.pid, "process already gone");
            }
        }
        debug!("listeners detached");
    }
}

/// The single terminal outcome of the event loop.
enum Settlement {
    Closed(Termination),
    Cancelled,
    Failed(io::Error),
}

/// Run `command` with `args` as a real OS process.
///
/// Resolves with the output when the process exits with code 0 and no signal;
/// rejects otherwise. See [`ExecError`] for the failure kinds.
///
/// ```no_run
/// use procexec::exec::{ExecOptions, execute};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let out = execute("echo", &["hello world"], ExecOptions::new()).await?;
/// assert_eq!(out.stdout, "hello world\n");
/// # Ok(())
/// # }
/// ```
pub async fn execute<O, E>(
    command: &str,
    args: &[&str],
    options: ExecOptions<O, E>,
) -> Result<ExecOutput<O::Captured, E::Captured>, ExecError<O::Captured, E::Captured>>
where
    O: OutputSink,
    E: OutputSink,
{
    execute_with(&TokioBackend::new(), command, args, options).await
}

/// Same as [`execute`], but on any [`ProcessBackend`].
pub async fn execute_with<B, O, E>(
    backend: &B,
    command: &str,
    args: &[&str],
    options: ExecOptions<O, E>,
) -> Result<ExecOutput<O::Captured, E::Captured>, ExecError<O::Captured, E::Captured>>
where
    B: ProcessBackend + ?Sized,
    O: OutputSink,
    E: OutputSink,
{
    let ExecOptions {
        mut stdout,
        mut stderr,
        signal,
    } = options;

    if signal.as_ref().is_some_and(CancellationToken::is_cancelled) {
        info!(cmd = %command, "cancellation requested before start; process not spawned");
        return Err(ExecError::CancelledBeforeSpawn {
            command: command.to_string(),
            cause: ExecOutput::new(Termination::aborted(), stdout.finish(), stderr.finish()),
        });
    }

    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    info!(cmd = %command, ?args, "starting process");

    let process = backend.spawn(command, &args).map_err(|source| {
        warn!(cmd = %command, error = %source, "failed to spawn process");
        ExecError::Spawn {
            command: command.to_string(),
            source,
        }
    })?;
    let pid = process.pid;
    let mut listeners = Listeners::attach(process, signal);

    let settlement = loop {
        match listeners.next().await {
            Wake::Cancelled => {
                info!(cmd = %command, pid, "cancellation requested; terminating process");
                if !listeners.control.kill(KillSignal::Terminate) {
                    debug!(cmd = %command, pid, "process already gone at cancellation");
                }
                break Settlement::Cancelled;
            }
            Wake::Event(Some(ProcessEvent::Stdout(chunk))) => {
                debug!(cmd = %command, pid, len = chunk.len(), "stdout chunk");
                stdout.accept(&chunk, &listeners.abort);
            }
            Wake::Event(Some(ProcessEvent::Stderr(chunk))) => {
                debug!(cmd = %command, pid, len = chunk.len(), "stderr chunk");
                stderr.accept(&chunk, &listeners.abort);
            }
            Wake::Event(Some(ProcessEvent::Closed(termination))) => {
                break Settlement::Closed(termination);
            }
            Wake::Event(Some(ProcessEvent::Error(e))) => break Settlement::Failed(e),
            Wake::Event(None) => {
                break Settlement::Failed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "process event stream ended before the process closed",
                ));
            }
        }
    };

    listeners.teardown();

    let stdout = stdout.finish();
    let stderr = stderr.finish();

    match settlement {
        Settlement::Closed(termination) => {
            info!(
                cmd = %command,
                pid,
                code = ?termination.code,
                signal = ?termination.signal,
                success = termination.success(),
                "process closed"
            );
            ExecError::from_close(command, ExecOutput::new(termination, stdout, stderr))
        }
        Settlement::Cancelled => Err(ExecError::Cancelled {
            command: command.to_string(),
            cause: ExecOutput::new(Termination::aborted(), stdout, stderr),
        }),
        Settlement::Failed(source) => {
            warn!(cmd = %command, pid, error = %source, "process failed");
            Err(ExecError::Process {
                command: command.to_string(),
                source,
            })
        }
    }
}
