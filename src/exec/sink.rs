// src/exec/sink.rs

//! Per-stream output policies.
//!
//! Each output stream is bound to one `OutputSink` when the options are
//! built: either [`Collect`] (accumulate internally) or [`Forward`] (hand every
//! chunk to a caller callback). The sink's `Captured` type becomes the
//! stream's field in the result, so the shape of `ExecOutput` is known at the
//! call site.

use std::fmt;

use super::coordinator::AbortHandle;

/// Marker stored in place of a stream's text when a handler consumed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streamed;

/// What happens to the chunks of one output stream.
pub trait OutputSink: Send {
    /// What this stream contributes to the result.
    type Captured: fmt::Debug + Send + 'static;

    fn accept(&mut self, chunk: &[u8], abort: &AbortHandle);

    /// Consume the sink at settlement.
    fn finish(self) -> Self::Captured;
}

/// Append-only accumulator. Bytes are decoded to text once, at settlement,
/// so multi-byte characters split across chunks survive intact.
#[derive(Debug, Default)]
pub struct Collect {
    buf: Vec<u8>,
}

impl OutputSink for Collect {
    type Captured = String;

    fn accept(&mut self, chunk: &[u8], _abort: &AbortHandle) {
        self.buf.extend_from_slice(chunk);
    }

    fn finish(self) -> String {
        match String::from_utf8(self.buf) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Delivers every chunk to a caller callback together with the abort handle.
pub struct Forward<F> {
    handler: F,
}

impl<F> Forward<F>
where
    F: FnMut(&[u8], &AbortHandle) + Send,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> fmt::Debug for Forward<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forward").finish_non_exhaustive()
    }
}

impl<F> OutputSink for Forward<F>
where
    F: FnMut(&[u8], &AbortHandle) + Send,
{
    type Captured = Streamed;

    fn accept(&mut self, chunk: &[u8], abort: &AbortHandle) {
        (self.handler)(chunk, abort);
    }

    fn finish(self) -> Streamed {
        Streamed
    }
}
