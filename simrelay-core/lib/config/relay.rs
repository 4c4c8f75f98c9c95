//! Relay configuration.
//!
//! All values have defaults and can be overridden through `SIMRELAY_*` environment variables:
//! - `SIMRELAY_PYTHON`: interpreter used to run worker programs (default: `python3`)
//! - `SIMRELAY_GATE_TIMEOUT_MS`: how long the frame gate waits for a command (default: 40)
//! - `SIMRELAY_POLL_INTERVAL_MS`: how long the relay waits for a worker message (default: 100)
//! - `SIMRELAY_STALL_LIMIT`: consecutive empty polls before a worker counts as stalled (default: 50)
//! - `SIMRELAY_MAX_FRAMES`: optional cap on relayed frames per run
//! - `SIMRELAY_STOP_GRACE_MS`: grace period between SIGTERM and SIGKILL (default: 500)
//! - `SIMRELAY_MAX_PUSH_FPS`: snapshot push rate cap per session (default: 30)
//! - `SIMRELAY_MAX_SESSIONS`: maximum concurrent sessions (default: 64)
//! - `SIMRELAY_SCRATCH_DIR`: parent directory of run scopes (default: system temp dir)
//! - `SIMRELAY_FORWARD_OUTPUT`: push program output to viewers (default: true)
//! - `SIMRELAY_MEMORY_LIMIT_MB`, `SIMRELAY_CPU_LIMIT_SECS`: optional worker rlimits

use std::{path::PathBuf, time::Duration};

use getset::{CopyGetters, Getters, Setters};
use serde::{Deserialize, Serialize};
use simrelay_utils::{env, defaults};
use typed_builder::TypedBuilder;

use crate::{SimrelayError, SimrelayResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings shared by every session the relay runs.
#[derive(Debug, Clone, TypedBuilder, Getters, CopyGetters, Setters)]
pub struct RelayConfig {
    /// Interpreter used to run worker programs
    #[builder(default = PathBuf::from(defaults::DEFAULT_PYTHON_EXE), setter(into))]
    #[getset(get = "pub with_prefix", set = "pub")]
    python_exe: PathBuf,

    /// How long the frame gate waits for a command before falling back
    #[builder(default = Duration::from_millis(defaults::DEFAULT_GATE_TIMEOUT_MS))]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    gate_timeout: Duration,

    /// How long the relay waits for a worker message before counting an empty poll
    #[builder(default = Duration::from_millis(defaults::DEFAULT_POLL_INTERVAL_MS))]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    poll_interval: Duration,

    /// Consecutive empty polls after which the worker is stopped as stalled
    #[builder(default = defaults::DEFAULT_STALL_LIMIT)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    stall_limit: u32,

    /// Optional cap on relayed frames per run
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    max_frames: Option<u64>,

    /// Grace period between SIGTERM and SIGKILL
    #[builder(default = Duration::from_millis(defaults::DEFAULT_STOP_GRACE_MS))]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    stop_grace: Duration,

    /// Maximum snapshots pushed to a viewer per second
    #[builder(default = defaults::DEFAULT_MAX_PUSH_FPS)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    max_push_fps: u32,

    /// Maximum concurrent sessions
    #[builder(default = defaults::DEFAULT_MAX_SESSIONS)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    max_sessions: usize,

    /// Capacity of each session's outbound event queue
    #[builder(default = defaults::DEFAULT_VIEWER_QUEUE_CAPACITY)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    viewer_queue_capacity: usize,

    /// Parent directory of run scopes
    #[builder(default = env::get_scratch_dir(), setter(into))]
    #[getset(get = "pub with_prefix", set = "pub")]
    scratch_dir: PathBuf,

    /// Whether program output is pushed to viewers as `output` events
    #[builder(default = true)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    forward_output: bool,

    /// Resource limits applied to worker processes
    #[builder(default)]
    #[getset(get = "pub with_prefix", set = "pub")]
    limits: WorkerLimits,
}

/// Optional rlimits applied to each worker process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLimits {
    /// Address-space limit in MiB
    pub memory_mb: Option<u64>,

    /// CPU time limit in seconds
    pub cpu_secs: Option<u64>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RelayConfig {
    /// Builds a configuration from `SIMRELAY_*` environment variables, falling back to defaults
    /// for anything unset, and validates it.
    pub fn from_env() -> SimrelayResult<Self> {
        let mut config = Self::default();

        if let Some(python) = env::parse_env_var::<String>(env::PYTHON_EXE_ENV_VAR)? {
            config.python_exe = PathBuf::from(python);
        }

        if let Some(ms) = env::parse_env_var::<u64>(env::GATE_TIMEOUT_ENV_VAR)? {
            config.gate_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = env::parse_env_var::<u64>(env::POLL_INTERVAL_ENV_VAR)? {
            config.poll_interval = Duration::from_millis(ms);
        }

        if let Some(limit) = env::parse_env_var::<u32>(env::STALL_LIMIT_ENV_VAR)? {
            config.stall_limit = limit;
        }

        if let Some(frames) = env::parse_env_var::<u64>(env::MAX_FRAMES_ENV_VAR)? {
            config.max_frames = Some(frames);
        }

        if let Some(ms) = env::parse_env_var::<u64>(env::STOP_GRACE_ENV_VAR)? {
            config.stop_grace = Duration::from_millis(ms);
        }

        if let Some(fps) = env::parse_env_var::<u32>(env::MAX_PUSH_FPS_ENV_VAR)? {
            config.max_push_fps = fps;
        }

        if let Some(max) = env::parse_env_var::<usize>(env::MAX_SESSIONS_ENV_VAR)? {
            config.max_sessions = max;
        }

        if let Some(forward) = env::parse_env_flag(env::FORWARD_OUTPUT_ENV_VAR)? {
            config.forward_output = forward;
        }

        config.limits = WorkerLimits {
            memory_mb: env::parse_env_var::<u64>(env::MEMORY_LIMIT_ENV_VAR)?,
            cpu_secs: env::parse_env_var::<u64>(env::CPU_LIMIT_ENV_VAR)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Checks that the values are usable together.
    pub fn validate(&self) -> SimrelayResult<()> {
        if self.gate_timeout.is_zero() {
            return Err(SimrelayError::Config(
                "gate timeout must be greater than zero".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(SimrelayError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        // A worker that waits out every gate must still look alive to the relay.
        if self.gate_timeout > self.poll_interval {
            return Err(SimrelayError::Config(format!(
                "gate timeout ({:?}) must not exceed the poll interval ({:?})",
                self.gate_timeout, self.poll_interval
            )));
        }

        if self.stall_limit == 0 {
            return Err(SimrelayError::Config(
                "stall limit must be at least 1".to_string(),
            ));
        }

        if self.max_frames == Some(0) {
            return Err(SimrelayError::Config(
                "max frames must be at least 1 when set".to_string(),
            ));
        }

        if self.max_push_fps == 0 {
            return Err(SimrelayError::Config(
                "max push rate must be at least 1 frame per second".to_string(),
            ));
        }

        if self.max_sessions == 0 {
            return Err(SimrelayError::Config(
                "max sessions must be at least 1".to_string(),
            ));
        }

        if self.viewer_queue_capacity == 0 {
            return Err(SimrelayError::Config(
                "viewer queue capacity must be at least 1".to_string(),
            ));
        }

        if !self.scratch_dir.is_dir() {
            return Err(SimrelayError::Config(format!(
                "scratch directory does not exist: {}",
                self.scratch_dir.display()
            )));
        }

        if self.limits.memory_mb == Some(0) || self.limits.cpu_secs == Some(0) {
            return Err(SimrelayError::Config(
                "worker limits must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }

    /// The minimum spacing between two pushed snapshots.
    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_push_fps.max(1)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for RelayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
