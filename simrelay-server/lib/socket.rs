//! Viewer WebSocket sessions.
//!
//! A connection registers one session. Session events and request replies share the socket; a
//! writer task forwards both, while the reader dispatches viewer messages in arrival order. When
//! the viewer goes away the session is torn down.

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use simrelay_core::session::{SessionRegistry, ViewerEnvelope};
use tokio::sync::mpsc;

use crate::{
    payload::{ClientMessage, ServerMessage},
    state::AppState,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const REPLY_CAPACITY: usize = 64;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Serves one viewer connection until it closes.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let registry = state.get_registry().clone();

    let (id, mut events) = match registry.connect().await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("refusing viewer connection: {e}");
            if let Some(text) = encode(&ServerMessage::rejected(None, e.to_string())) {
                let _ = ws_tx.send(Message::Text(text.into())).await;
            }
            let _ = ws_tx.close().await;
            return;
        }
    };

    let (reply_tx, mut replies) = mpsc::channel::<ServerMessage>(REPLY_CAPACITY);
    let welcome = ServerMessage::Welcome {
        session_id: id.clone(),
    };
    let _ = reply_tx.send(welcome).await;

    let writer = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                Some(reply) = replies.recv() => encode(&reply),
                Some(envelope) = events.recv() => encode::<ViewerEnvelope>(&envelope),
                else => break,
            };

            if let Some(text) = text {
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(message) = ws_rx.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("session {id}: websocket receive error: {e}");
                break;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(message) => dispatch(&registry, &id, message).await,
            Err(e) => ServerMessage::rejected(None, format!("invalid message: {e}")),
        };

        if reply_tx.send(reply).await.is_err() {
            break;
        }
    }

    registry.disconnect(&id).await;
    writer.abort();
}

/// Handles one viewer message for session `id` and builds the reply.
pub async fn dispatch(registry: &SessionRegistry, id: &str, message: ClientMessage) -> ServerMessage {
    let result = match &message {
        ClientMessage::StartRun { files, level } => registry
            .start_run(id, files.clone(), level.clone())
            .await
            .map(|_| true),
        ClientMessage::StopRun => registry.stop_run(id).await,
        ClientMessage::SubmitInput { command } => match command.parse() {
            Ok(command) => registry.submit_input(id, command).await,
            Err(e) => Err(e),
        },
        ClientMessage::RequestRefresh => registry.request_refresh(id).await,
        ClientMessage::Ping { time } => {
            return ServerMessage::Pong {
                time: time.clone(),
                server_time: Utc::now().to_rfc3339(),
            };
        }
    };

    match result {
        Ok(applied) => ServerMessage::ack(&message, applied),
        Err(e) => {
            tracing::debug!("session {id}: {} rejected: {e}", message.name());
            ServerMessage::rejected(Some(&message), e.to_string())
        }
    }
}

fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("failed to serialize viewer message: {e}");
            None
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
