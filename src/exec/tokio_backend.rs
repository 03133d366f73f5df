// src/exec/tokio_backend.rs

//! Production process backend built on `tokio::process`.

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::backend::{KillSignal, ProcessBackend, ProcessControl, ProcessEvent, SpawnedProcess};
use super::termination::Termination;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const READ_BUF_SIZE: usize = 8 * 1024;

/// Spawns real OS processes.
///
/// For each process three Tokio tasks are started:
/// - one pump per output pipe, forwarding raw chunks as `ProcessEvent`s;
/// - a supervisor that owns the `Child`, delivers kill requests, reaps the
///   process and emits `Closed` once both pumps have finished.
///
/// When the coordinator drops its event receiver the pumps stop at their next
/// send; the supervisor still reaps the child.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioBackend;

impl TokioBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for TokioBackend {
    fn spawn(&self, command: &str, args: &[String]) -> io::Result<SpawnedProcess> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let pid = child.id();

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();

        let stdout_pump = child
            .stdout
            .take()
            .map(|out| spawn_pump(out, event_tx.clone(), ProcessEvent::Stdout));
        let stderr_pump = child
            .stderr
            .take()
            .map(|err| spawn_pump(err, event_tx.clone(), ProcessEvent::Stderr));

        tokio::spawn(supervise(child, kill_rx, event_tx, [stdout_pump, stderr_pump]));

        Ok(SpawnedProcess::new(
            pid,
            event_rx,
            Arc::new(ChannelControl { kill_tx }),
        ))
    }
}

/// Forwards kill requests to the supervisor task that owns the child.
///
/// Signals are only ever delivered to a process that has not been reaped yet,
/// so a recycled pid can never be hit.
struct ChannelControl {
    kill_tx: mpsc::UnboundedSender<KillSignal>,
}

impl ProcessControl for ChannelControl {
    fn kill(&self, signal: KillSignal) -> bool {
        self.kill_tx.send(signal).is_ok()
    }
}

fn spawn_pump<R>(
    reader: R,
    tx: mpsc::Sender<ProcessEvent>,
    wrap: fn(Vec<u8>) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = pump(reader, &tx, wrap).await {
            let _ = tx.send(ProcessEvent::Error(e)).await;
        }
    })
}

async fn pump<R>(
    mut reader: R,
    tx: &mpsc::Sender<ProcessEvent>,
    wrap: fn(Vec<u8>) -> ProcessEvent,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if tx.send(wrap(buf[..n].to_vec())).await.is_err() {
            debug!("event receiver dropped; stopping output pump");
            return Ok(());
        }
    }
}

async fn supervise(
    mut child: Child,
    mut kill_rx: mpsc::UnboundedReceiver<KillSignal>,
    event_tx: mpsc::Sender<ProcessEvent>,
    pumps: [Option<JoinHandle<()>>; 2],
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(signal) = kill_rx.recv() => deliver(&mut child, signal),
        }
    };

    // `Closed` must follow every chunk, so wait for both pipes to drain.
    for pump in pumps.into_iter().flatten() {
        let _ = pump.await;
    }

    let event = match status {
        Ok(status) => ProcessEvent::Closed(Termination::from_status(status)),
        Err(e) => ProcessEvent::Error(e),
    };
    let _ = event_tx.send(event).await;
}

#[cfg(unix)]
fn deliver(child: &mut Child, signal: KillSignal) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw_pid) = child.id() else {
        debug!(%signal, "process already reaped; dropping signal");
        return;
    };
    let sig = match signal {
        KillSignal::Terminate => Signal::SIGTERM,
        KillSignal::Kill => Signal::SIGKILL,
    };
    match kill(Pid::from_raw(raw_pid as i32), sig) {
        Ok(()) => debug!(pid = raw_pid, %signal, "signal delivered"),
        Err(e) => warn!(pid = raw_pid, %signal, error = %e, "failed to deliver signal"),
    }
}

#[cfg(not(unix))]
fn deliver(child: &mut Child, signal: KillSignal) {
    // No soft terminate outside Unix; both requests end the process.
    if let Err(e) = child.start_kill() {
        warn!(%signal, error = %e, "failed to kill process");
    }
}
