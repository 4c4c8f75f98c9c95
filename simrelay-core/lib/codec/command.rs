use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::SimrelayError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A control input delivered to the running program through the frame gate.
///
/// Serialized as the upper-case direction name. Parsing is case-insensitive and rejects anything
/// that is not one of the four names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlCommand {
    /// Move up
    Up,

    /// Move down
    Down,

    /// Move left
    Left,

    /// Move right
    #[default]
    Right,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ControlCommand {
    /// All commands, in wire order.
    pub const ALL: [ControlCommand; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// The wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = SimrelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            _ => Err(SimrelayError::InvalidCommand(s.to_string())),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
