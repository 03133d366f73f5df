mod common;
use crate::common::{exited, init_tracing, killed_by, stderr, stdout, with_timeout, TestResult};

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use procexec::exec::{
    ABORT_SIGNAL, AbortHandle, ExecError, ExecOptions, ExecOutput, KillSignal, ProcessEvent,
    Streamed, execute_with,
};
use procexec_test_utils::ScriptedBackend;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&[u8], &AbortHandle) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = move |chunk: &[u8], _abort: &AbortHandle| {
        sink.lock()
            .unwrap()
            .push(String::from_utf8_lossy(chunk).into_owned());
    };
    (seen, handler)
}

#[tokio::test]
async fn collects_both_streams_on_clean_exit() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![
        stdout("hel"),
        stderr("warn"),
        stdout("lo\n"),
        exited(0),
    ]);

    let out = execute_with(&backend, "greet", &[], ExecOptions::new()).await?;

    assert_eq!(
        out,
        ExecOutput {
            code: Some(0),
            signal: None,
            stdout: "hello\n".to_string(),
            stderr: "warn".to_string(),
        }
    );
    assert_eq!(backend.spawn_count(), 1);
    assert!(backend.signals().is_empty());
    Ok(())
}

#[tokio::test]
async fn passes_command_and_args_through() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![exited(0)]);
    execute_with(&backend, "grep", &["-n", "needle"], ExecOptions::new()).await?;

    assert_eq!(backend.spawned(), vec![vec!["grep", "-n", "needle"]]);
    Ok(())
}

#[tokio::test]
async fn handled_stream_is_delivered_not_collected() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![
        stdout("a"),
        stderr("oops"),
        stdout("b"),
        exited(0),
    ]);
    let (seen, handler) = recorder();

    let out: ExecOutput<Streamed, String> =
        execute_with(&backend, "cmd", &[], ExecOptions::new().on_stdout(handler)).await?;

    assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(out.stdout, Streamed);
    assert_eq!(out.stderr, "oops");
    Ok(())
}

#[tokio::test]
async fn stderr_handler_leaves_stdout_collected() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stderr("e1"), stdout("o"), stderr("e2"), exited(0)]);
    let (seen, handler) = recorder();

    let out: ExecOutput<String, Streamed> =
        execute_with(&backend, "cmd", &[], ExecOptions::new().on_stderr(handler)).await?;

    assert_eq!(*seen.lock().unwrap(), vec!["e1", "e2"]);
    assert_eq!(out.stdout, "o");
    assert_eq!(out.stderr, Streamed);
    Ok(())
}

#[tokio::test]
async fn events_after_close_never_reach_handlers() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![
        stdout("before"),
        exited(0),
        stdout("late"),
        stderr("late"),
        exited(1),
    ]);
    let (out_seen, on_out) = recorder();
    let (err_seen, on_err) = recorder();

    let out = execute_with(
        &backend,
        "cmd",
        &[],
        ExecOptions::new().on_stdout(on_out).on_stderr(on_err),
    )
    .await?;

    assert!(out.success());
    assert_eq!(*out_seen.lock().unwrap(), vec!["before"]);
    assert!(err_seen.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_exposes_output_in_cause() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stdout("partial"), stderr("bad input"), exited(2)]);

    let err = execute_with(&backend, "rg", &["x"], ExecOptions::new())
        .await
        .expect_err("exit 2 must reject");

    assert!(matches!(err, ExecError::ExitCode { code: 2, .. }));
    assert_eq!(err.code(), Some(2));
    assert_eq!(err.signal(), None);
    let cause = err.cause().expect("abnormal close carries a cause");
    assert_eq!(cause.stdout, "partial");
    assert_eq!(cause.stderr, "bad input");
    Ok(())
}

#[tokio::test]
async fn signal_termination_rejects_even_with_zero_code() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![ProcessEvent::Closed(
        procexec::exec::Termination {
            code: Some(0),
            signal: Some("SIGHUP".to_string()),
        },
    )]);

    let err = execute_with(&backend, "daemon", &[], ExecOptions::new())
        .await
        .expect_err("signal must reject");

    assert!(matches!(err, ExecError::Signaled { ref signal, .. } if signal == "SIGHUP"));
    Ok(())
}

#[tokio::test]
async fn already_cancelled_token_never_spawns() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![exited(0)]);
    let token = CancellationToken::new();
    token.cancel();

    let err = execute_with(&backend, "rm", &["-rf", "x"], ExecOptions::new().signal(token))
        .await
        .expect_err("pre-cancelled call must reject");

    assert!(matches!(err, ExecError::CancelledBeforeSpawn { .. }));
    assert!(err.is_cancelled());
    assert_eq!(err.code(), None);
    assert_eq!(err.signal(), Some(ABORT_SIGNAL));
    assert_eq!(backend.spawn_count(), 0);
    Ok(())
}

#[tokio::test]
async fn already_cancelled_with_handlers_has_streamed_cause() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![exited(0)]);
    let token = CancellationToken::new();
    token.cancel();
    let (seen, handler) = recorder();

    let err = execute_with(
        &backend,
        "cmd",
        &[],
        ExecOptions::new().on_stdout(handler).signal(token),
    )
    .await
    .expect_err("pre-cancelled call must reject");

    let cause = err.into_cause().expect("cancellation carries a cause");
    assert_eq!(cause.stdout, Streamed);
    assert_eq!(cause.stderr, "");
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(backend.spawn_count(), 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_mid_run_terminates_and_rejects_immediately() -> TestResult {
    init_tracing();

    // Never closes on its own.
    let backend = ScriptedBackend::new(vec![stdout("working")]).hold_open();
    let token = CancellationToken::new();

    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
    }

    let err = with_timeout(execute_with(
        &backend,
        "sleep",
        &["5"],
        ExecOptions::new().signal(token),
    ))
    .await
    .expect_err("cancellation must reject");

    assert!(matches!(err, ExecError::Cancelled { .. }));
    assert_eq!(backend.signals(), vec![KillSignal::Terminate]);

    let cause = err.into_cause().expect("cancellation carries a cause");
    assert_eq!(cause.code, None);
    assert_eq!(cause.signal.as_deref(), Some(ABORT_SIGNAL));
    assert_eq!(cause.stdout, "working");
    Ok(())
}

#[tokio::test]
async fn close_after_cancellation_is_ignored() -> TestResult {
    init_tracing();

    // The fake process reports SIGTERM as soon as it is signalled.
    let backend = ScriptedBackend::new(vec![]).exit_on_signal();
    let token = CancellationToken::new();
    let (seen, handler) = recorder();

    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
    }

    let err = with_timeout(execute_with(
        &backend,
        "server",
        &[],
        ExecOptions::new().on_stdout(handler).signal(token),
    ))
    .await
    .expect_err("cancellation must reject");

    // Reported as the abort marker, not the SIGTERM the process died from.
    assert!(err.is_cancelled());
    assert_eq!(err.signal(), Some(ABORT_SIGNAL));
    assert!(seen.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn abort_from_handler_surfaces_as_signal_failure() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stdout("ready\n")]).exit_on_signal();
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);

    let err = with_timeout(execute_with(
        &backend,
        "server",
        &[],
        ExecOptions::new().on_stdout(move |chunk: &[u8], abort: &AbortHandle| {
            *counter.lock().unwrap() += 1;
            if chunk.starts_with(b"ready") {
                abort.abort();
            }
        }),
    ))
    .await
    .expect_err("aborted process must reject");

    assert!(matches!(err, ExecError::Signaled { ref signal, .. } if signal == "SIGKILL"));
    assert_eq!(err.code(), None);
    assert_eq!(backend.signals(), vec![KillSignal::Kill]);
    assert_eq!(*calls.lock().unwrap(), 1);
    Ok(())
}

#[tokio::test]
async fn abort_keeps_collected_stderr_in_cause() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stderr("log line"), stdout("stop")]).exit_on_signal();

    let err = with_timeout(execute_with(
        &backend,
        "server",
        &[],
        ExecOptions::new().on_stdout(|_chunk: &[u8], abort: &AbortHandle| abort.abort()),
    ))
    .await
    .expect_err("aborted process must reject");

    let cause = err.into_cause().expect("signal failure carries a cause");
    assert_eq!(cause.signal.as_deref(), Some("SIGKILL"));
    assert_eq!(cause.stdout, Streamed);
    assert_eq!(cause.stderr, "log line");
    Ok(())
}

#[tokio::test]
async fn spawn_failure_carries_raw_error() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::failing(io::ErrorKind::NotFound);

    let err = execute_with(&backend, "nonexistent-cmd-xyz", &[], ExecOptions::new())
        .await
        .expect_err("spawn failure must reject");

    assert!(matches!(err, ExecError::Spawn { .. }));
    assert!(err.cause().is_none());
    assert_eq!(err.io_error().map(io::Error::kind), Some(io::ErrorKind::NotFound));
    Ok(())
}

#[tokio::test]
async fn process_error_event_rejects_without_cause() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![
        stdout("x"),
        ProcessEvent::Error(io::Error::other("pipe read failed")),
        exited(0),
    ]);

    let err = execute_with(&backend, "cmd", &[], ExecOptions::new())
        .await
        .expect_err("error event must reject");

    assert!(matches!(err, ExecError::Process { .. }));
    assert!(err.cause().is_none());
    Ok(())
}

#[tokio::test]
async fn event_source_ending_without_close_rejects() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stdout("x")]);

    let err = with_timeout(execute_with(&backend, "cmd", &[], ExecOptions::new()))
        .await
        .expect_err("missing close must reject");

    assert_eq!(
        err.io_error().map(io::Error::kind),
        Some(io::ErrorKind::BrokenPipe)
    );
    Ok(())
}

#[tokio::test]
async fn killed_process_without_handlers_reports_signal() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stdout("half"), killed_by("SIGSEGV")]);

    let err = execute_with(&backend, "crashy", &[], ExecOptions::new())
        .await
        .expect_err("crash must reject");

    assert_eq!(err.to_string(), "`crashy` was terminated by signal SIGSEGV");
    assert_eq!(err.cause().map(|c| c.stdout.as_str()), Some("half"));
    Ok(())
}

#[tokio::test]
async fn dropping_unsettled_call_kills_process() {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stdout("working")]).hold_open();

    let elapsed = tokio::time::timeout(
        Duration::from_millis(50),
        execute_with(&backend, "sleep", &["5"], ExecOptions::new()),
    )
    .await;

    assert!(elapsed.is_err(), "held-open process must not settle");
    assert_eq!(backend.signals(), vec![KillSignal::Kill]);
}

#[tokio::test]
async fn settled_call_sends_no_signal_on_teardown() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new(vec![stdout("done"), exited(3)]);
    let err = execute_with(&backend, "job", &[], ExecOptions::new())
        .await
        .expect_err("exit 3 must reject");

    assert_eq!(err.code(), Some(3));
    assert!(backend.signals().is_empty());
    Ok(())
}
