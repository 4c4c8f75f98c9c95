//! Configuration types and helpers.

mod relay;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use relay::*;
