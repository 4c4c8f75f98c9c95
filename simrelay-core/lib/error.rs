use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a simrelay related operation.
pub type SimrelayResult<T> = Result<T, SimrelayError>;

/// An error that occurred during a simrelay operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SimrelayError {
    /// The submitted source bundle is not acceptable
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// No file in the bundle could be chosen as the program entry point
    #[error("no entry point found among: {0}")]
    NoEntryPoint(String),

    /// A control command could not be parsed
    #[error("invalid command: {0:?} (expected UP, DOWN, LEFT or RIGHT)")]
    InvalidCommand(String),

    /// The session does not exist
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session with the same id is already registered
    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),

    /// The registry is full
    #[error("maximum number of sessions ({0}) reached")]
    SessionLimitReached(usize),

    /// The worker process could not be started
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),

    /// The worker sent something that is not a valid protocol message
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The channel to the worker is closed
    #[error("worker channel closed: {0}")]
    WorkerChannel(String),

    /// The configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error from simrelay-utils
    #[error(transparent)]
    Utils(#[from] simrelay_utils::SimrelayUtilsError),

    /// An error from a system call
    #[error("system error: {0}")]
    Nix(#[from] nix::Error),

    /// Custom error.
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
}

/// The category of a failure surfaced to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The program failed before it reached the frame gate for the first time
    Load,

    /// The program failed after it started producing frames
    Runtime,

    /// The program stopped calling the frame gate
    Stall,

    /// The host/worker channel broke or the worker died without a report
    Channel,
}

/// A failure as reported to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Failure category
    pub kind: FailureKind,

    /// Exception type name, when the failure came from the program
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,

    /// Human-readable message
    pub message: String,

    /// File the failure originated in, relative to the bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Line the failure originated on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Formatted traceback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FailureReport {
    /// Creates a report that carries only a kind and a message.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exception: None,
            message: message.into(),
            filename: None,
            line: None,
            traceback: None,
        }
    }

    /// A one-line summary such as `NameError: name 'x' is not defined (snake.py:12)`.
    pub fn summary(&self) -> String {
        let mut text = match &self.exception {
            Some(exception) if !self.message.is_empty() => format!("{exception}: {}", self.message),
            Some(exception) => exception.clone(),
            None => self.message.clone(),
        };

        match (&self.filename, self.line) {
            (Some(file), Some(line)) => text.push_str(&format!(" ({file}:{line})")),
            (Some(file), None) => text.push_str(&format!(" ({file})")),
            _ => {}
        }

        text
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Runtime => write!(f, "runtime"),
            Self::Stall => write!(f, "stall"),
            Self::Channel => write!(f, "channel"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
