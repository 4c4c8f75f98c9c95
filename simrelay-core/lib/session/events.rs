use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use crate::{codec::Snapshot, worker::RunMetadata, FailureKind, FailureReport};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An event pushed to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ViewerEvent {
    /// A frame of the running program
    Snapshot {
        /// Run the frame belongs to
        run_id: String,

        /// The frame
        snapshot: Snapshot,

        /// Whether this re-sends an already relayed frame
        #[serde(default)]
        replay: bool,
    },

    /// A run started
    RunStarted {
        /// What was started
        metadata: RunMetadata,

        /// Level or context metadata supplied with the request
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<Value>,
    },

    /// A run was ended by the host
    RunStopped {
        /// The run
        run_id: String,

        /// Why it ended
        reason: StopReason,
    },

    /// A run failed
    Error {
        /// The run
        run_id: String,

        /// One-line description
        message: String,

        /// Full failure details
        report: FailureReport,
    },

    /// A line the program printed
    Output {
        /// The run
        run_id: String,

        /// The line, without its terminator
        line: String,
    },
}

/// Why the host ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The viewer asked for the run to stop
    Requested,

    /// A new run replaced it
    Replaced,

    /// The program stopped reaching the frame gate
    Stalled,

    /// The run reached the configured frame limit
    FrameLimit,

    /// The viewer disconnected
    Disconnected,

    /// The relay is shutting down
    Shutdown,
}

/// An event addressed to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerEnvelope {
    /// The session
    pub session_id: String,

    /// The event
    #[serde(flatten)]
    pub event: ViewerEvent,
}

/// The outbound queue of one session.
///
/// Lifecycle events wait for room in the queue. Snapshots and program output are dropped when the
/// viewer falls behind, since only the latest frame matters.
#[derive(Debug, Clone)]
pub struct ViewerChannel {
    session_id: String,
    tx: Sender<ViewerEnvelope>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ViewerEvent {
    /// Builds an error event from a failure report.
    pub fn error(run_id: impl Into<String>, report: FailureReport) -> Self {
        Self::Error {
            run_id: run_id.into(),
            message: report.summary(),
            report,
        }
    }

    /// The failure kind, for error events.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Error { report, .. } => Some(report.kind),
            _ => None,
        }
    }

    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::RunStarted { .. } => "run_started",
            Self::RunStopped { .. } => "run_stopped",
            Self::Error { .. } => "error",
            Self::Output { .. } => "output",
        }
    }
}

impl ViewerChannel {
    /// Creates a channel for a session and the receiving end the transport drains.
    pub fn new(session_id: impl Into<String>, capacity: usize) -> (Self, Receiver<ViewerEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                session_id: session_id.into(),
                tx,
            },
            rx,
        )
    }

    /// The session this channel belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queues an event, waiting for room. Returns `false` if the viewer is gone.
    pub async fn emit(&self, event: ViewerEvent) -> bool {
        tracing::debug!("session {}: {}", self.session_id, event.name());
        self.tx.send(self.envelope(event)).await.is_ok()
    }

    /// Queues an event if there is room. Returns `false` if it was dropped.
    pub fn offer(&self, event: ViewerEvent) -> bool {
        match self.tx.try_send(self.envelope(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                tracing::trace!(
                    "session {}: viewer queue full, dropped {}",
                    self.session_id,
                    envelope.event.name()
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the viewer stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn envelope(&self, event: ViewerEvent) -> ViewerEnvelope {
        ViewerEnvelope {
            session_id: self.session_id.clone(),
            event,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Replaced => "replaced",
            Self::Stalled => "stalled",
            Self::FrameLimit => "frame_limit",
            Self::Disconnected => "disconnected",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
