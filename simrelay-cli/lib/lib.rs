//! `simrelay-cli` provides the `simrelay` and `simrelayserver` binaries.

#![warn(missing_docs)]

mod args;
mod error;
mod serve;
mod styles;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use args::*;
pub use error::*;
pub use serve::*;
pub use styles::*;
