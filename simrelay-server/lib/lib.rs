//! `simrelay-server` serves viewer sessions.
//!
//! Each WebSocket connection is one viewer session. Viewers send run requests and control
//! commands, and receive snapshots and lifecycle events of the program running on their behalf.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod payload;
pub mod route;
pub mod socket;
pub mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use config::*;
pub use error::*;
pub use handler::*;
pub use middleware::*;
pub use payload::*;
pub use route::*;
pub use socket::*;
pub use state::*;
