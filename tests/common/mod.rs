#![allow(dead_code)]

use procexec::exec::{ProcessEvent, Termination};

pub use procexec_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn stdout(text: &str) -> ProcessEvent {
    ProcessEvent::Stdout(text.as_bytes().to_vec())
}

pub fn stderr(text: &str) -> ProcessEvent {
    ProcessEvent::Stderr(text.as_bytes().to_vec())
}

pub fn exited(code: i32) -> ProcessEvent {
    ProcessEvent::Closed(Termination::exited(code))
}

pub fn killed_by(signal: &str) -> ProcessEvent {
    ProcessEvent::Closed(Termination::signaled(signal))
}
