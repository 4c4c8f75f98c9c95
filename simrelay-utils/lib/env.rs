//! Utility functions for working with environment variables.

use std::{path::PathBuf, str::FromStr};

use crate::{SimrelayUtilsError, SimrelayUtilsResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable for the interpreter used to run worker programs
pub const PYTHON_EXE_ENV_VAR: &str = "SIMRELAY_PYTHON";

/// Environment variable for the frame gate timeout in milliseconds
pub const GATE_TIMEOUT_ENV_VAR: &str = "SIMRELAY_GATE_TIMEOUT_MS";

/// Environment variable for the relay poll interval in milliseconds
pub const POLL_INTERVAL_ENV_VAR: &str = "SIMRELAY_POLL_INTERVAL_MS";

/// Environment variable for the number of empty polls tolerated before a stall
pub const STALL_LIMIT_ENV_VAR: &str = "SIMRELAY_STALL_LIMIT";

/// Environment variable for the optional per-run frame limit
pub const MAX_FRAMES_ENV_VAR: &str = "SIMRELAY_MAX_FRAMES";

/// Environment variable for the stop grace period in milliseconds
pub const STOP_GRACE_ENV_VAR: &str = "SIMRELAY_STOP_GRACE_MS";

/// Environment variable for the snapshot push rate cap
pub const MAX_PUSH_FPS_ENV_VAR: &str = "SIMRELAY_MAX_PUSH_FPS";

/// Environment variable for the maximum number of sessions
pub const MAX_SESSIONS_ENV_VAR: &str = "SIMRELAY_MAX_SESSIONS";

/// Environment variable for the directory holding per-run scratch directories
pub const SCRATCH_DIR_ENV_VAR: &str = "SIMRELAY_SCRATCH_DIR";

/// Environment variable toggling forwarding of program output to viewers
pub const FORWARD_OUTPUT_ENV_VAR: &str = "SIMRELAY_FORWARD_OUTPUT";

/// Environment variable for the worker address-space limit in MiB
pub const MEMORY_LIMIT_ENV_VAR: &str = "SIMRELAY_MEMORY_LIMIT_MB";

/// Environment variable for the worker CPU time limit in seconds
pub const CPU_LIMIT_ENV_VAR: &str = "SIMRELAY_CPU_LIMIT_SECS";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads and parses an environment variable.
///
/// Returns `Ok(None)` when the variable is unset or empty, and an error when it is set to a value
/// that does not parse.
pub fn parse_env_var<T: FromStr>(name: &str) -> SimrelayUtilsResult<Option<T>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SimrelayUtilsError::InvalidEnvValue {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Reads a boolean flag. Accepts `1/0`, `true/false`, `yes/no` and `on/off`.
pub fn parse_env_flag(name: &str) -> SimrelayUtilsResult<Option<bool>> {
    let Some(value) = parse_env_var::<String>(name)? else {
        return Ok(None);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(SimrelayUtilsError::InvalidEnvValue {
            name: name.to_string(),
            value,
        }),
    }
}

/// Returns the directory under which run scratch directories are created.
/// If the SIMRELAY_SCRATCH_DIR environment variable is set, returns that path.
/// Otherwise, returns the system temporary directory.
pub fn get_scratch_dir() -> PathBuf {
    match std::env::var(SCRATCH_DIR_ENV_VAR) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
