//! Router configuration.

use axum::{middleware, routing::get, Router};

use crate::{handler, middleware as app_middleware, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates the router with the given state.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handler::health))
        .route("/sessions", get(handler::sessions))
        .route("/ws", get(handler::viewer_socket));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(app_middleware::logging_middleware))
        .with_state(state)
}
