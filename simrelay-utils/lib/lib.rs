//! `simrelay_utils` is a library containing general utilities for the simrelay project.

#![warn(missing_docs)]

/// Default values shared by every crate.
pub mod defaults;

/// Environment variable lookups.
pub mod env;

/// Errors raised by the utilities.
pub mod error;

/// Bundle file name validation.
pub mod path;

/// Terminal glyphs.
pub mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use env::*;
pub use error::*;
pub use path::*;
pub use term::*;
