use serde::{Deserialize, Serialize};

use crate::{
    codec::{ControlCommand, ProgramState},
    FailureReport, SimrelayError, SimrelayResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A message written by the worker on its protocol stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// The program reached the frame gate
    Frame {
        /// Strictly increasing frame counter
        frame: u64,

        /// Module-level variables at the time of the call
        state: ProgramState,
    },

    /// The program failed. Always the last message of a run.
    Error(FailureReport),
}

/// A message written by the host to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// The latest control command
    Command {
        /// The command
        command: ControlCommand,
    },

    /// Asks the worker to exit at its next gate call
    Stop,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WorkerMessage {
    /// Parses one protocol line.
    pub fn parse_line(line: &str) -> SimrelayResult<Self> {
        serde_json::from_str(line.trim())
            .map_err(|e| SimrelayError::Protocol(format!("{e} in worker line {:?}", truncate(line))))
    }
}

impl HostMessage {
    /// Encodes the message as one newline-terminated line.
    pub fn to_line(&self) -> SimrelayResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(120) {
        Some((index, _)) => &line[..index],
        None => line,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
