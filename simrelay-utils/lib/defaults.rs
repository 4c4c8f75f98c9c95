//! Default values shared across the simrelay crates.

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default port the relay server listens on.
pub const DEFAULT_SERVER_PORT: u16 = 5055;

/// The default interpreter used to run worker programs.
pub const DEFAULT_PYTHON_EXE: &str = "python3";

/// How long the frame gate inside a worker waits for a command before falling back.
pub const DEFAULT_GATE_TIMEOUT_MS: u64 = 40;

/// How long the relay waits for a worker message before counting an empty poll.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Consecutive empty polls after which a worker is considered stalled.
pub const DEFAULT_STALL_LIMIT: u32 = 50;

/// Grace period between SIGTERM and SIGKILL when stopping a worker.
pub const DEFAULT_STOP_GRACE_MS: u64 = 500;

/// Maximum number of snapshots pushed to a viewer per second.
pub const DEFAULT_MAX_PUSH_FPS: u32 = 30;

/// Maximum number of concurrently connected viewer sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Capacity of the per-session outbound event queue.
pub const DEFAULT_VIEWER_QUEUE_CAPACITY: usize = 256;

/// Prefix of the scoped temporary directories holding a run's files.
pub const SCRATCH_DIR_PREFIX: &str = "simrelay-";

/// Files tried, in order, when choosing the program entry point.
pub const DEFAULT_ENTRY_CANDIDATES: &[&str] = &["snake.py", "main.py"];
