// src/errors.rs

//! Errors `run` can return before a command starts.
//!
//! Execution failures themselves are [`ExecError`](crate::exec::ExecError);
//! they are mapped to an exit status rather than bubbled up as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcexecError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid --abort-on pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ProcexecError>;
