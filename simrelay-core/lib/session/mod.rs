//! Viewer sessions.
//!
//! - [`SessionRegistry`] maps session ids to controllers
//! - [`SessionController`] owns at most one running worker per session
//! - the relay task pumps snapshots out of the worker and commands into it
//! - [`ViewerChannel`] carries [`ViewerEvent`]s to the viewer

mod controller;
mod events;
mod registry;
mod relay;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use controller::*;
pub use events::*;
pub use registry::*;
pub use relay::RunOutcome;
