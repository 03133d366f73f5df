// src/exec/options.rs

use tokio_util::sync::CancellationToken;

use super::coordinator::AbortHandle;
use super::sink::{Collect, Forward, OutputSink};

/// Per-call configuration: one sink per output stream plus an optional
/// cancellation token.
///
/// The builder is type-state: `on_stdout` / `on_stderr` replace the stream's
/// sink type, which in turn fixes the shape of the result.
///
/// ```no_run
/// use procexec::exec::{AbortHandle, ExecOptions, execute};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let out = execute(
///     "sh",
///     &["-c", "echo hi; echo oops >&2"],
///     ExecOptions::new().on_stdout(|chunk: &[u8], _abort: &AbortHandle| {
///         print!("{}", String::from_utf8_lossy(chunk));
///     }),
/// )
/// .await?;
/// assert_eq!(out.stderr, "oops\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ExecOptions<O = Collect, E = Collect> {
    pub(crate) stdout: O,
    pub(crate) stderr: E,
    pub(crate) signal: Option<CancellationToken>,
}

impl ExecOptions {
    /// Collect both streams, no cancellation.
    pub fn new() -> Self {
        Self {
            stdout: Collect::default(),
            stderr: Collect::default(),
            signal: None,
        }
    }
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: OutputSink, E: OutputSink> ExecOptions<O, E> {
    /// Deliver stdout chunks to `handler` instead of accumulating them.
    pub fn on_stdout<F>(self, handler: F) -> ExecOptions<Forward<F>, E>
    where
        F: FnMut(&[u8], &AbortHandle) + Send,
    {
        ExecOptions {
            stdout: Forward::new(handler),
            stderr: self.stderr,
            signal: self.signal,
        }
    }

    /// Deliver stderr chunks to `handler` instead of accumulating them.
    pub fn on_stderr<F>(self, handler: F) -> ExecOptions<O, Forward<F>>
    where
        F: FnMut(&[u8], &AbortHandle) + Send,
    {
        ExecOptions {
            stdout: self.stdout,
            stderr: Forward::new(handler),
            signal: self.signal,
        }
    }

    /// Cancel the execution when `token` is cancelled.
    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signal = Some(token);
        self
    }
}
