// src/exec/output.rs

use std::io;

use thiserror::Error;

use super::termination::Termination;

/// Result of a finished process.
///
/// `O` / `E` are `String` for a collected stream and
/// [`Streamed`](super::sink::Streamed) for a stream that went to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput<O = String, E = String> {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal name; `None` on a normal exit.
    pub signal: Option<String>,
    pub stdout: O,
    pub stderr: E,
}

impl<O, E> ExecOutput<O, E> {
    pub fn new(termination: Termination, stdout: O, stderr: E) -> Self {
        Self {
            code: termination.code,
            signal: termination.signal,
            stdout,
            stderr,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

/// Failure of one execution.
///
/// Every variant except `Spawn` and `Process` carries a `cause` shaped exactly
/// like the success payload, including whatever output was accumulated before
/// the failure.
#[derive(Debug, Error)]
pub enum ExecError<O = String, E = String> {
    #[error("`{command}` was cancelled before it started")]
    CancelledBeforeSpawn {
        command: String,
        cause: ExecOutput<O, E>,
    },

    #[error("`{command}` was cancelled")]
    Cancelled {
        command: String,
        cause: ExecOutput<O, E>,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` could not be observed: {source}")]
    Process {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` was terminated by signal {signal}")]
    Signaled {
        command: String,
        signal: String,
        cause: ExecOutput<O, E>,
    },

    #[error("`{command}` exited with code {code}")]
    ExitCode {
        command: String,
        code: i32,
        cause: ExecOutput<O, E>,
    },
}

impl<O, E> ExecError<O, E> {
    /// Code/signal/output payload, if this failure has one.
    pub fn cause(&self) -> Option<&ExecOutput<O, E>> {
        match self {
            ExecError::CancelledBeforeSpawn { cause, .. }
            | ExecError::Cancelled { cause, .. }
            | ExecError::Signaled { cause, .. }
            | ExecError::ExitCode { cause, .. } => Some(cause),
            ExecError::Spawn { .. } | ExecError::Process { .. } => None,
        }
    }

    pub fn into_cause(self) -> Option<ExecOutput<O, E>> {
        match self {
            ExecError::CancelledBeforeSpawn { cause, .. }
            | ExecError::Cancelled { cause, .. }
            | ExecError::Signaled { cause, .. }
            | ExecError::ExitCode { cause, .. } => Some(cause),
            ExecError::Spawn { .. } | ExecError::Process { .. } => None,
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.cause().and_then(|c| c.code)
    }

    pub fn signal(&self) -> Option<&str> {
        self.cause().and_then(|c| c.signal.as_deref())
    }

    /// True for both cancellation variants.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ExecError::CancelledBeforeSpawn { .. } | ExecError::Cancelled { .. }
        )
    }

    /// The raw OS error of a spawn or process-level failure.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            ExecError::Spawn { source, .. } | ExecError::Process { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Classify a close event. `Ok` only for code 0 without a signal.
    pub(crate) fn from_close(
        command: &str,
        output: ExecOutput<O, E>,
    ) -> Result<ExecOutput<O, E>, Self> {
        if output.success() {
            return Ok(output);
        }
        let command = command.to_string();
        Err(match output.signal.clone() {
            Some(signal) => ExecError::Signaled {
                command,
                signal,
                cause: output,
            },
            None => ExecError::ExitCode {
                command,
                code: output.code.unwrap_or(-1),
                cause: output,
            },
        })
    }
}
