//! Materialization of source bundles into isolated run scopes.
//!
//! A run scope is a scoped temporary directory holding:
//! - every file of the submitted bundle
//! - stub modules for support files the bundle imports but does not provide
//! - the runtime assets the worker needs (frame gate harness, default constants, display shim)
//!
//! The scope is removed when the run ends.

mod bootstrap;
mod bundle;
mod constants;
mod stubs;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use bootstrap::*;
pub use bundle::*;
pub use constants::*;
pub use stubs::*;
