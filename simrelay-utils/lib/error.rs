//! Errors raised by the simrelay utilities.

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a simrelay-utils related operation.
pub type SimrelayUtilsResult<T> = Result<T, SimrelayUtilsError>;

/// An error that occurred during a simrelay-utils operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SimrelayUtilsError {
    /// A relative path failed validation
    #[error("invalid path: {0}")]
    PathValidation(String),

    /// An environment variable was set to a value that could not be parsed
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnvValue {
        /// The name of the variable
        name: String,

        /// The raw value
        value: String,
    },

    /// An I/O error
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
