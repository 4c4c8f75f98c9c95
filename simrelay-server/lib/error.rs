//! Server errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use simrelay_core::SimrelayError;
use thiserror::Error;

use crate::payload::ErrorResponse;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a server operation.
pub type ServerResult<T> = Result<T, ServerError>;

/// An error raised by the server.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ServerError {
    /// A session operation failed
    #[error(transparent)]
    Relay(#[from] SimrelayError),

    /// An I/O error, e.g. binding the listener
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServerError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Relay(e) => match e {
                SimrelayError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                SimrelayError::SessionAlreadyExists(_) => StatusCode::CONFLICT,
                SimrelayError::SessionLimitReached(_) => StatusCode::SERVICE_UNAVAILABLE,
                SimrelayError::InvalidBundle(_)
                | SimrelayError::NoEntryPoint(_)
                | SimrelayError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
