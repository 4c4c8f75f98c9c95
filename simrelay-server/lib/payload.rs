//! Request and response payloads.
//!
//! Viewer WebSocket messages are JSON objects. Inbound messages are tagged by `type`; outbound
//! messages are tagged by `event`, with their fields under `data`, matching the session events
//! relayed from [`simrelay_core::session::ViewerEnvelope`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use simrelay_core::session::SessionSummary;

//--------------------------------------------------------------------------------------------------
// Types: REST API
//--------------------------------------------------------------------------------------------------

/// Response carrying a plain message
#[derive(Debug, Serialize, Deserialize)]
pub struct RegularMessageResponse {
    /// The message
    pub message: String,
}

/// Response describing a failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong
    pub error: String,
}

/// Response listing the live sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    /// Configured session limit
    pub max_sessions: usize,

    /// The sessions
    pub sessions: Vec<SessionSummary>,
}

//--------------------------------------------------------------------------------------------------
// Types: WebSocket
//--------------------------------------------------------------------------------------------------

/// A message sent by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run a bundle of source files, replacing any running program
    StartRun {
        /// File name to source text
        #[serde(default)]
        files: BTreeMap<String, String>,

        /// Level or context metadata, echoed in `run_started`
        #[serde(default)]
        level: Option<Value>,
    },

    /// Stop the running program
    StopRun,

    /// Set the latest control command
    SubmitInput {
        /// `UP`, `DOWN`, `LEFT` or `RIGHT`, case-insensitive
        command: String,
    },

    /// Re-send the latest snapshot
    RequestRefresh,

    /// Keepalive
    Ping {
        /// Opaque client timestamp, echoed back
        #[serde(default)]
        time: Option<Value>,
    },
}

/// A reply to a viewer message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once when the connection is accepted
    Welcome {
        /// The session this connection is bound to
        session_id: String,
    },

    /// Reply to `ping`
    Pong {
        /// The client timestamp
        time: Option<Value>,

        /// Server time, RFC 3339
        server_time: String,
    },

    /// The request was handled
    Ack {
        /// The request type
        request: String,

        /// Whether the request changed anything, e.g. `false` for `stop_run` while idle
        applied: bool,
    },

    /// The request could not be handled
    Rejected {
        /// The request type, when the message could be parsed
        request: Option<String>,

        /// Why
        message: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ClientMessage {
    /// The wire name of the message type.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::StartRun { .. } => "start_run",
            ClientMessage::StopRun => "stop_run",
            ClientMessage::SubmitInput { .. } => "submit_input",
            ClientMessage::RequestRefresh => "request_refresh",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

impl ServerMessage {
    /// An acknowledgement of `request`.
    pub fn ack(request: &ClientMessage, applied: bool) -> Self {
        ServerMessage::Ack {
            request: request.name().to_string(),
            applied,
        }
    }

    /// A rejection of `request`.
    pub fn rejected(request: Option<&ClientMessage>, message: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            request: request.map(|r| r.name().to_string()),
            message: message.into(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
