// src/lib.rs

pub mod abort_on;
pub mod cli;
pub mod errors;
pub mod exec;
pub mod logging;

use std::io::Write;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::abort_on::LineMatcher;
use crate::cli::CliArgs;
use crate::errors::{ProcexecError, Result};
use crate::exec::termination::signal_number;
use crate::exec::{AbortHandle, ExecError, ExecOptions, ExecOutput, execute};

/// Exit status used when the command was cancelled (timeout or Ctrl-C).
pub const EXIT_CANCELLED: i32 = 124;
/// Exit status used when the command could not be started.
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the cancellation token (fed by `--timeout` and Ctrl-C)
/// - the coordinator, in collected or streamed mode
/// - mapping the outcome to the exit status `procexec` should return
pub async fn run(args: CliArgs) -> Result<i32> {
    if args.command.trim().is_empty() {
        return Err(ProcexecError::InvalidArgument(
            "command must not be empty".to_string(),
        ));
    }

    let abort_on = args.abort_on.as_deref().map(Regex::new).transpose()?;
    let token = CancellationToken::new();

    // Ctrl-C → cancel the running command.
    {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling command");
            token.cancel();
        });
    }

    if let Some(timeout) = args.timeout {
        spawn_timeout(token.clone(), timeout);
    }

    let argv: Vec<&str> = args.args.iter().map(String::as_str).collect();

    let status = if args.stream || abort_on.is_some() {
        run_streamed(&args.command, &argv, token, abort_on).await
    } else {
        run_collected(&args.command, &argv, token).await
    };

    debug!(status, "command finished");
    Ok(status)
}

/// Cancel `token` once `timeout` has elapsed.
pub fn spawn_timeout(token: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                info!(?timeout, "timeout elapsed; cancelling command");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}

async fn run_collected(command: &str, args: &[&str], token: CancellationToken) -> i32 {
    let result = execute(command, args, ExecOptions::new().signal(token)).await;

    let captured = match &result {
        Ok(out) => Some(out),
        Err(err) => err.cause(),
    };
    if let Some(out) = captured {
        print!("{}", out.stdout);
        eprint!("{}", out.stderr);
    }

    report(command, &result);
    exit_status(&result)
}

async fn run_streamed(
    command: &str,
    args: &[&str],
    token: CancellationToken,
    abort_on: Option<Regex>,
) -> i32 {
    let mut matcher = abort_on.map(LineMatcher::new);

    let options = ExecOptions::new()
        .signal(token)
        .on_stdout(move |chunk: &[u8], abort: &AbortHandle| {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(chunk);
            let _ = out.flush();

            if let Some(m) = matcher.as_mut() {
                if m.feed(chunk) {
                    info!("stdout matched --abort-on pattern; aborting command");
                    abort.abort();
                }
            }
        })
        .on_stderr(|chunk: &[u8], _abort: &AbortHandle| {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(chunk);
            let _ = err.flush();
        });

    let result = execute(command, args, options).await;
    report(command, &result);
    exit_status(&result)
}

fn report<O, E>(command: &str, result: &std::result::Result<ExecOutput<O, E>, ExecError<O, E>>) {
    match result {
        Ok(out) => info!(cmd = %command, code = ?out.code, "command succeeded"),
        Err(err) if err.is_cancelled() => warn!(cmd = %command, "{err}"),
        Err(err) => warn!(cmd = %command, code = ?err.code(), signal = ?err.signal(), "{err}"),
    }
}

/// Map an execution outcome to the exit status `procexec` returns.
///
/// - success → 0
/// - nonzero exit → the same code
/// - terminated by a known signal → `128 + signal number`
/// - cancelled → [`EXIT_CANCELLED`]
/// - could not be started → [`EXIT_SPAWN_FAILED`]
pub fn exit_status<O, E>(result: &std::result::Result<ExecOutput<O, E>, ExecError<O, E>>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(ExecError::CancelledBeforeSpawn { .. } | ExecError::Cancelled { .. }) => {
            EXIT_CANCELLED
        }
        Err(ExecError::Spawn { .. }) => EXIT_SPAWN_FAILED,
        Err(ExecError::Process { .. }) => 1,
        Err(ExecError::Signaled { signal, .. }) => {
            signal_number(signal).map(|n| 128 + n).unwrap_or(1)
        }
        Err(ExecError::ExitCode { code, .. }) => *code,
    }
}
