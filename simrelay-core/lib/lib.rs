//! `simrelay` runs untrusted, user-authored simulation programs inside isolated worker processes
//! and relays their state to a live viewer, frame by frame.
//!
//! # Overview
//!
//! A viewer supplies a bundle of source files. The relay:
//! - materializes the bundle into a scoped temporary directory, with stub modules for support
//!   files the program imports but does not provide
//! - runs the program in a separate OS process that blocks once per tick on a *frame gate*
//! - turns the program's variables into a structured [`Snapshot`](codec::Snapshot) each tick
//! - pushes the snapshot to the viewer and feeds the viewer's latest control input back in
//!
//! A viewer session never has more than one simulation running, a crashing or looping program
//! cannot take the relay down, and processes and temporary files are always reclaimed.
//!
//! # Modules
//!
//! - [`codec`] - Snapshot and control command encoding
//! - [`config`] - Relay configuration loaded from the environment
//! - [`sandbox`] - Source bundle validation and scope bootstrapping
//! - [`worker`] - Worker processes and the host/worker line protocol
//! - [`session`] - Session controllers, the relay loop and the session registry

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod codec;
pub mod config;
pub mod sandbox;
pub mod session;
pub mod worker;

pub use error::*;
