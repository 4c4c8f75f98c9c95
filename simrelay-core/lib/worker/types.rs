use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::WorkerMessage;
use crate::{codec::ControlCommand, sandbox::SourceBundle, SimrelayResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A running instance of a user program.
#[async_trait]
pub trait Worker: Send {
    /// The run this worker belongs to.
    fn run_id(&self) -> &str;

    /// Waits for the next event. Returns `None` once the worker closed its streams.
    async fn recv(&mut self) -> Option<WorkerEvent>;

    /// Delivers a control command to the frame gate.
    async fn send_command(&mut self, command: ControlCommand) -> SimrelayResult<()>;

    /// Waits for the worker to exit on its own.
    async fn wait_exit(&mut self) -> SimrelayResult<WorkerExit>;

    /// Stops the worker, escalating to a forced kill after `grace`, and releases its resources.
    ///
    /// Calling it on a worker that already exited only releases resources.
    async fn shutdown(&mut self, grace: Duration) -> SimrelayResult<WorkerExit>;
}

/// Starts workers for source bundles.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Bootstraps `bundle` and starts a worker for it.
    async fn launch(&self, run_id: &str, bundle: &SourceBundle) -> SimrelayResult<LaunchedWorker>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Something the worker produced.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A protocol message
    Message(WorkerMessage),

    /// A line the program printed
    Output(String),
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerExit {
    /// Exit code, when the process exited normally
    pub code: Option<i32>,

    /// Terminating signal, when the process was killed
    pub signal: Option<i32>,
}

/// Describes a started run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Identifier of the run
    pub run_id: String,

    /// Entry point file
    pub entry: String,

    /// Files supplied by the bundle
    pub files: Vec<String>,

    /// Stub modules synthesized for the run
    pub stubs: Vec<String>,

    /// Whether the placeholder program runs in place of an empty bundle
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

/// A worker together with the description of its run.
pub struct LaunchedWorker {
    /// The worker
    pub worker: Box<dyn Worker>,

    /// What was started
    pub metadata: RunMetadata,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WorkerExit {
    /// An exit with the given code.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Whether the worker exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

impl fmt::Debug for LaunchedWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedWorker")
            .field("run_id", &self.worker.run_id())
            .field("metadata", &self.metadata)
            .finish()
    }
}
