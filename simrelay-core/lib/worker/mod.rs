//! Worker processes and the line protocol spoken between host and worker.
//!
//! A worker runs one instance of a user program. The program blocks once per tick on the frame
//! gate, which publishes the program state and waits a bounded time for the next command.

mod process;
mod protocol;
mod types;

#[cfg(test)]
pub(crate) mod scripted;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use process::*;
pub use protocol::*;
pub use types::*;
