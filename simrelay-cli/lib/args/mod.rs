mod simrelay;
mod simrelayserver;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use simrelay::*;
pub use simrelayserver::*;
