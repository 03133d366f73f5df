use std::io;
use std::sync::{Arc, Mutex};

use procexec::exec::{
    KillSignal, ProcessBackend, ProcessControl, ProcessEvent, SpawnedProcess, Termination,
};
use tokio::sync::mpsc;
use tracing::debug;

/// A fake process backend that:
/// - records every spawn (command followed by its args)
/// - replays a fixed list of `ProcessEvent`s on the first spawn
/// - records every signal the coordinator sends
///
/// By default the event source closes after the script, like a process whose
/// pipes and exit were all observed. `hold_open()` keeps it open to model a
/// process that never exits on its own.
#[derive(Clone)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
}

struct State {
    script: Option<Vec<ProcessEvent>>,
    spawn_error: Option<io::ErrorKind>,
    hold_open: bool,
    exit_on_signal: bool,
    spawned: Vec<Vec<String>>,
    signals: Arc<Mutex<Vec<KillSignal>>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ProcessEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                script: Some(script),
                spawn_error: None,
                hold_open: false,
                exit_on_signal: false,
                spawned: Vec::new(),
                signals: Arc::new(Mutex::new(Vec::new())),
            })),
        }
    }

    /// A backend whose spawn always fails with `kind`.
    pub fn failing(kind: io::ErrorKind) -> Self {
        let backend = Self::new(Vec::new());
        backend.state.lock().unwrap().spawn_error = Some(kind);
        backend
    }

    /// Keep the event source open after the script.
    pub fn hold_open(self) -> Self {
        self.state.lock().unwrap().hold_open = true;
        self
    }

    /// Keep the event source open and emit `Closed` with the signal's name as
    /// soon as a signal arrives, like a process that dies on any signal.
    pub fn exit_on_signal(self) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.hold_open = true;
            state.exit_on_signal = true;
        }
        self
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().spawned.len()
    }

    /// Command lines seen so far, each as `[command, args...]`.
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().spawned.clone()
    }

    /// Signals delivered so far, in order.
    pub fn signals(&self) -> Vec<KillSignal> {
        let state = self.state.lock().unwrap();
        let signals = state.signals.lock().unwrap();
        signals.clone()
    }
}

impl ProcessBackend for ScriptedBackend {
    fn spawn(&self, command: &str, args: &[String]) -> io::Result<SpawnedProcess> {
        let mut state = self.state.lock().unwrap();

        let mut line = vec![command.to_string()];
        line.extend(args.iter().cloned());
        debug!(?line, "scripted spawn");
        state.spawned.push(line);

        if let Some(kind) = state.spawn_error {
            return Err(io::Error::new(kind, format!("scripted spawn failure for `{command}`")));
        }

        let script = state.script.take().unwrap_or_default();
        let (tx, rx) = mpsc::channel(script.len() + 4);
        for event in script {
            tx.try_send(event)
                .map_err(|e| io::Error::other(format!("script does not fit channel: {e}")))?;
        }

        let held = if state.hold_open { Some(tx) } else { None };
        let control = RecordingControl {
            signals: Arc::clone(&state.signals),
            exit_on_signal: state.exit_on_signal,
            tx: Mutex::new(held),
        };

        Ok(SpawnedProcess::new(Some(4242), rx, Arc::new(control)))
    }
}

struct RecordingControl {
    signals: Arc<Mutex<Vec<KillSignal>>>,
    exit_on_signal: bool,
    tx: Mutex<Option<mpsc::Sender<ProcessEvent>>>,
}

impl ProcessControl for RecordingControl {
    fn kill(&self, signal: KillSignal) -> bool {
        self.signals.lock().unwrap().push(signal);

        if self.exit_on_signal {
            if let Some(tx) = self.tx.lock().unwrap().take() {
                let _ = tx.try_send(ProcessEvent::Closed(Termination::signaled(signal.name())));
            }
        }
        true
    }
}
