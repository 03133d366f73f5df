// src/exec/termination.rs

use std::fmt;
use std::process::ExitStatus;

/// Signal name reported on cancellation failures.
///
/// Reported whether or not the process was actually terminated by this
/// signal: a cancelled process receives `SIGTERM`, but the failure carries
/// this marker.
pub const ABORT_SIGNAL: &str = "SIGABRT";

/// How a process ended: exit code and/or terminating signal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Termination {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Signal name (`"SIGKILL"`); `None` on a normal exit.
    pub signal: Option<String>,
}

impl Termination {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }

    /// The cancellation marker: no code, `SIGABRT`.
    pub fn aborted() -> Self {
        Self::signaled(ABORT_SIGNAL)
    }

    /// Exit code 0 and no terminating signal.
    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: signal_name(&status),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.signal, self.code) {
            (Some(sig), _) => write!(f, "signal {sig}"),
            (None, Some(code)) => write!(f, "exit code {code}"),
            (None, None) => f.write_str("unknown termination"),
        }
    }
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> Option<String> {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|raw| match Signal::try_from(raw) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => raw.to_string(),
    })
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> Option<String> {
    None
}

/// Map a signal name back to its number, for exit-status mirroring.
#[cfg(unix)]
pub fn signal_number(name: &str) -> Option<i32> {
    use std::str::FromStr;

    nix::sys::signal::Signal::from_str(name)
        .ok()
        .map(|sig| sig as i32)
}

#[cfg(not(unix))]
pub fn signal_number(_name: &str) -> Option<i32> {
    None
}
