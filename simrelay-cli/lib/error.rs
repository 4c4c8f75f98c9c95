use simrelay_core::SimrelayError;
use simrelay_server::ServerError;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a CLI operation.
pub type SimrelayCliResult<T> = Result<T, SimrelayCliError>;

/// An error raised by the CLI.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SimrelayCliError {
    /// An I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A relay error
    #[error(transparent)]
    Relay(#[from] SimrelayError),

    /// A server error
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The interpreter could not be found
    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    /// Any other error
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
