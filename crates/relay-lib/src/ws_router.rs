// ============================
// crates/relay-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection handling.
use crate::handler::ConnectionHandler;
use crate::metrics::{WS_ACTIVE, WS_CONNECTION};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use pairlink_common::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

/// Create the router: the signaling socket plus a liveness probe.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "pairlink relay is running" }))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for WebSocket connections
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);

    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    // Outbox: everything the server pushes to this participant, replies and
    // relayed frames alike, goes through one channel.
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ServerMessage>(state.settings.outbox_capacity);

    let handler = ConnectionHandler::new(state, outbox_tx.clone());
    let participant_id = handler.participant_id();

    // Forward outbox messages onto the wire.
    let send_task = tokio::spawn(async move {
        while let Some(server_msg) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&server_msg) {
                Ok(json) => json,
                Err(err) => {
                    error!(%err, "failed to serialize outbound frame");
                    continue;
                },
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    if let Err(err) = handler.handle_message(client_msg).await {
                        if err.is_benign() {
                            // Expected teardown races; nothing to tell the
                            // client.
                            debug!(participant = %participant_id, %err, "benign failure dropped");
                            continue;
                        }
                        warn!(participant = %participant_id, %err, "request failed");
                        let reply = ServerMessage::Error {
                            code: err.error_code().to_string(),
                            message: err.to_string(),
                        };
                        if outbox_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                },
                Err(err) => {
                    let reply = ServerMessage::MalformedMessage {
                        err_msg: err.to_string(),
                    };
                    if outbox_tx.send(reply).await.is_err() {
                        break;
                    }
                },
            },
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the
            // protocol.
            _ => {},
        }
    }

    // Cleanup: withdraw, deregister, and tear down any live match.
    handler.closed().await;

    gauge!(WS_ACTIVE).decrement(1.0);
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_route_answers() {
        let state = Arc::new(AppState::new(Settings::default()));
        let app = create_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"pairlink relay is running");
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let state = Arc::new(AppState::new(Settings::default()));
        let app = create_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ws")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // plain GET without the upgrade handshake is rejected
        assert_ne!(response.status(), axum::http::StatusCode::OK);
    }
}
