//! Worker implementation backed by a separate interpreter process.
//!
//! Each worker:
//! - runs the frame gate harness from a freshly bootstrapped scope
//! - lives in its own process group with a scrubbed environment and optional rlimits
//! - streams protocol lines from stdout and program output from stderr
//! - is stopped with SIGTERM to its process group, then SIGKILL after a grace period

use std::{os::unix::process::ExitStatusExt, process::Stdio, time::Duration};

use async_trait::async_trait;
use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, Command},
    sync::mpsc::{self, Receiver, Sender},
    time::timeout,
};

use super::{
    HostMessage, LaunchedWorker, RunMetadata, Worker, WorkerEvent, WorkerExit, WorkerLauncher,
    WorkerMessage,
};
use crate::{
    codec::ControlCommand,
    config::{RelayConfig, WorkerLimits},
    sandbox::{bootstrap, SandboxScope, SourceBundle},
    FailureKind, FailureReport, SimrelayError, SimrelayResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const WORKER_EVENT_CAPACITY: usize = 256;

const WORKER_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Longest protocol line accepted from a worker.
const MAX_PROTOCOL_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Longest program output line relayed to viewers.
const MAX_OUTPUT_LINE_BYTES: usize = 8 * 1024;

const TRUNCATED_SUFFIX: &str = " [truncated]";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Launches workers as interpreter processes.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: RelayConfig,
}

/// A worker running as an interpreter process.
pub struct ProcessWorker {
    run_id: String,
    child: Child,
    pgid: Option<Pid>,
    stdin: Option<ChildStdin>,
    events: Receiver<WorkerEvent>,
    scope: Option<SandboxScope>,
    exit: Option<WorkerExit>,
    reaped: bool,
}

struct BoundedLine {
    text: String,
    truncated: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessLauncher {
    /// Creates a launcher using the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    fn command(&self, scope: &SandboxScope) -> Command {
        let gate_ms = self.config.get_gate_timeout().as_millis().max(1);

        let mut command = Command::new(self.config.get_python_exe());
        command
            .arg("-I")
            .arg("-B")
            .arg("-u")
            .arg(scope.harness_path())
            .arg(scope.path())
            .arg(scope.get_entry())
            .arg(gate_ms.to_string())
            .arg(ControlCommand::default().as_str())
            .current_dir(scope.path())
            .env_clear()
            .env("PATH", WORKER_PATH)
            .env("HOME", scope.path())
            .env("LC_ALL", "C.UTF-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        let limits = *self.config.get_limits();
        if limits != WorkerLimits::default() {
            // SAFETY: the closure only calls setrlimit, which is async-signal-safe.
            unsafe {
                command.pre_exec(move || apply_limits(&limits));
            }
        }

        command
    }
}

impl ProcessWorker {
    fn spawn(run_id: String, scope: SandboxScope, mut command: Command) -> SimrelayResult<Self> {
        let mut child = command.spawn().map_err(|e| {
            SimrelayError::WorkerSpawn(format!(
                "{}: {e}",
                command.as_std().get_program().to_string_lossy()
            ))
        })?;

        let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SimrelayError::WorkerSpawn("worker stdout is not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SimrelayError::WorkerSpawn("worker stderr is not piped".to_string()))?;

        let (events_tx, events) = mpsc::channel(WORKER_EVENT_CAPACITY);
        tokio::spawn(read_protocol(run_id.clone(), stdout, events_tx.clone()));
        tokio::spawn(read_output(run_id.clone(), stderr, events_tx));

        tracing::info!(
            "started worker for run {run_id} (pid {:?}, scope {})",
            pgid,
            scope.path().display()
        );

        Ok(Self {
            run_id,
            child,
            pgid,
            stdin,
            events,
            scope: Some(scope),
            exit: None,
            reaped: false,
        })
    }

    /// Signals the worker's process group while its leader is unreaped.
    ///
    /// Returns whether a signal was sent.
    fn signal_group(&self, signal: Signal) -> bool {
        let Some(pgid) = self.pgid.filter(|_| !self.reaped) else {
            return false;
        };

        match killpg(pgid, signal) {
            Ok(()) => true,
            Err(nix::errno::Errno::ESRCH) => false,
            Err(e) => {
                tracing::warn!("failed to send {signal} to worker {}: {e}", self.run_id);
                false
            }
        }
    }

    async fn reap(&mut self) -> SimrelayResult<WorkerExit> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(exit_from_status(status))
    }

    fn release_scope(&mut self) -> SimrelayResult<()> {
        match self.scope.take() {
            Some(scope) => scope.close(),
            None => Ok(()),
        }
    }

    async fn terminate(&mut self, grace: Duration) -> SimrelayResult<WorkerExit> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Ok(line) = HostMessage::Stop.to_line() {
                let _ = timeout(grace, stdin.write_all(line.as_bytes())).await;
            }
        }

        if let Some(status) = self.child.try_wait()? {
            self.reaped = true;
            return Ok(exit_from_status(status));
        }

        self.signal_group(Signal::SIGTERM);
        match timeout(grace, self.reap()).await {
            Ok(exit) => exit,
            Err(_) => {
                tracing::warn!(
                    "worker {} did not exit within {grace:?}, killing it",
                    self.run_id
                );
                self.signal_group(Signal::SIGKILL);
                self.reap().await
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, run_id: &str, bundle: &SourceBundle) -> SimrelayResult<LaunchedWorker> {
        let scope = bootstrap(bundle, self.config.get_scratch_dir()).await?;
        let metadata = RunMetadata {
            run_id: run_id.to_string(),
            entry: scope.get_entry().clone(),
            files: scope.get_files().clone(),
            stubs: scope.get_stubs().clone(),
            placeholder: *scope.get_placeholder(),
        };

        let command = self.command(&scope);
        let worker = ProcessWorker::spawn(run_id.to_string(), scope, command)?;

        Ok(LaunchedWorker {
            worker: Box::new(worker),
            metadata,
        })
    }
}

#[async_trait]
impl Worker for ProcessWorker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn recv(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    async fn send_command(&mut self, command: ControlCommand) -> SimrelayResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SimrelayError::WorkerChannel("worker input is closed".to_string()))?;

        let line = HostMessage::Command { command }.to_line()?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SimrelayError::WorkerChannel(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| SimrelayError::WorkerChannel(e.to_string()))
    }

    async fn wait_exit(&mut self) -> SimrelayResult<WorkerExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }

        let exit = self.reap().await?;
        self.exit = Some(exit);
        Ok(exit)
    }

    async fn shutdown(&mut self, grace: Duration) -> SimrelayResult<WorkerExit> {
        let exit = match self.exit {
            Some(exit) => exit,
            None => {
                let exit = self.terminate(grace).await?;
                self.exit = Some(exit);
                exit
            }
        };

        self.release_scope()?;
        tracing::info!("worker for run {} stopped ({exit})", self.run_id);

        Ok(exit)
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        self.signal_group(Signal::SIGKILL);
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn exit_from_status(status: std::process::ExitStatus) -> WorkerExit {
    WorkerExit {
        code: status.code(),
        signal: status.signal(),
    }
}

fn apply_limits(limits: &WorkerLimits) -> std::io::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};

    if let Some(mb) = limits.memory_mb {
        let bytes = mb.saturating_mul(1024 * 1024);
        setrlimit(Resource::RLIMIT_AS, bytes, bytes).map_err(std::io::Error::from)?;
    }

    if let Some(secs) = limits.cpu_secs {
        setrlimit(Resource::RLIMIT_CPU, secs, secs.saturating_add(1))
            .map_err(std::io::Error::from)?;
    }

    Ok(())
}

/// Reads one newline-terminated line of at most `max` bytes, tolerating invalid UTF-8.
///
/// Bytes past `max` are discarded up to the next newline and the line is marked truncated.
async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
    max: usize,
) -> Option<BoundedLine> {
    buf.clear();
    let mut truncated = false;

    loop {
        let available = match reader.fill_buf().await {
            Ok(available) => available,
            Err(_) => return None,
        };

        if available.is_empty() {
            if buf.is_empty() && !truncated {
                return None;
            }
            break;
        }

        let (chunk, used, complete) = match available.iter().position(|b| *b == b'\n') {
            Some(newline) => (&available[..newline], newline + 1, true),
            None => (available, available.len(), false),
        };

        let room = max.saturating_sub(buf.len());
        if chunk.len() > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        reader.consume(used);

        if complete {
            break;
        }
    }

    let text = String::from_utf8_lossy(buf);
    Some(BoundedLine {
        text: text.trim_end_matches('\r').to_string(),
        truncated,
    })
}

async fn read_protocol<R: AsyncRead + Unpin>(run_id: String, stdout: R, events: Sender<WorkerEvent>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    while let Some(line) = next_line(&mut reader, &mut buf, MAX_PROTOCOL_LINE_BYTES).await {
        if line.truncated {
            tracing::warn!("worker {run_id} sent a protocol line over {MAX_PROTOCOL_LINE_BYTES} bytes");
            let report = FailureReport::new(
                FailureKind::Channel,
                format!("worker sent a message larger than {MAX_PROTOCOL_LINE_BYTES} bytes"),
            );
            let _ = events.send(WorkerEvent::Message(WorkerMessage::Error(report))).await;
            break;
        }

        if line.text.trim().is_empty() {
            continue;
        }

        match WorkerMessage::parse_line(&line.text) {
            Ok(message) => {
                if events.send(WorkerEvent::Message(message)).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("worker {run_id}: {e}"),
        }
    }

    tracing::debug!("worker {run_id} closed its protocol stream");
}

async fn read_output<R: AsyncRead + Unpin>(run_id: String, stderr: R, events: Sender<WorkerEvent>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    while let Some(line) = next_line(&mut reader, &mut buf, MAX_OUTPUT_LINE_BYTES).await {
        let text = match line.truncated {
            true => format!("{}{TRUNCATED_SUFFIX}", line.text),
            false => line.text,
        };

        tracing::debug!("worker {run_id} output: {text}");
        if events.send(WorkerEvent::Output(text)).await.is_err() {
            // Keep draining so the program never blocks on a full pipe.
            while next_line(&mut reader, &mut buf, MAX_OUTPUT_LINE_BYTES).await.is_some() {}
            break;
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
