// src/cli.rs

//! CLI argument parsing using `clap`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procexec",
    version,
    about = "Run a command, collect or stream its output, and mirror its exit status.",
    long_about = None
)]
pub struct CliArgs {
    /// Cancel the command after this long (e.g. `250ms`, `3s`, `1m`, `2h`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Forward output as it arrives instead of printing it after exit.
    #[arg(long)]
    pub stream: bool,

    /// Kill the command as soon as a stdout line matches this regex.
    ///
    /// Implies `--stream` for stdout.
    #[arg(long, value_name = "REGEX")]
    pub abort_on: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Program to run.
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Arguments passed to the program verbatim.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Parse a `--timeout` value: digits followed by `ms`, `s`, `m` or `h`.
///
/// Values whose seconds do not fit in a `u64` are rejected instead of wrapping.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let Some(split) = input.find(|c: char| !c.is_ascii_digit()) else {
        return Err(if input.is_empty() {
            "empty duration".to_string()
        } else {
            format!("duration '{input}' needs a unit (ms, s, m or h)")
        });
    };

    let (digits, unit) = input.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|e| format!("bad number in duration '{input}': {e}"))?;

    let secs_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(amount)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        other => return Err(format!("unknown duration unit '{other}' (ms, s, m or h)")),
    };
    amount
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{input}' is too large"))
}
