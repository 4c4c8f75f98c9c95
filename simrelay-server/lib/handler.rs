//! Request handlers.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    payload::{RegularMessageResponse, SessionsResponse},
    socket,
    state::AppState,
    ServerResult,
};

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

/// Handles health check requests.
pub async fn health() -> ServerResult<impl IntoResponse> {
    Ok((
        StatusCode::OK,
        Json(RegularMessageResponse {
            message: "Service is healthy".to_string(),
        }),
    ))
}

/// Lists the live viewer sessions.
pub async fn sessions(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let registry = state.get_registry();
    Ok(Json(SessionsResponse {
        max_sessions: registry.config().get_max_sessions(),
        sessions: registry.summaries().await,
    }))
}

/// Upgrades a request to a viewer WebSocket. The connection is one viewer session.
pub async fn viewer_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| socket::handle_socket(socket, state))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
