//! Encoding of program state into snapshots and of viewer input into control commands.

mod command;
mod snapshot;
mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use command::*;
pub use snapshot::*;
pub use state::*;
