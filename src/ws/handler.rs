//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ConnectionId, LobbyHandle, LobbyInput, OUTBOX_CAPACITY};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ProtocolError, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id: ConnectionId = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    if !state.lobby.send(LobbyInput::Open { conn: conn_id, outbox }).await {
        error!(conn_id = %conn_id, "Lobby is not running");
        return;
    }

    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    run_session(conn_id, socket, &state.lobby, outbox_rx, rate_limiter).await;

    // Errors and clean closes end up here alike
    state.lobby.send(LobbyInput::Close { conn: conn_id }).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: ConnectionId,
    socket: WebSocket,
    lobby: &LobbyHandle,
    mut outbox_rx: mpsc::Receiver<ServerMsg>,
    rate_limiter: ConnectionRateLimiter,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Spawn writer task: lobby outbox -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Reader loop: WebSocket -> lobby
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match ClientMsg::parse(&text) {
                    Ok(msg) => {
                        if !admit(&rate_limiter, &msg) {
                            warn!(conn_id = %conn_id, command = msg.command(), "Rate limited input message");
                            continue;
                        }
                        let leaving = matches!(msg, ClientMsg::Leave {});
                        if !lobby.send(LobbyInput::Message { conn: conn_id, msg }).await {
                            debug!(conn_id = %conn_id, "Lobby channel closed");
                            break;
                        }
                        if leaving {
                            info!(conn_id = %conn_id, "Client left");
                            break;
                        }
                    }
                    Err(ProtocolError::UnknownCommand(command)) => {
                        warn!(conn_id = %conn_id, command = %command, "Unknown command");
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Movement frames count against the limiter; hits, projectile removals,
/// pickups and leave always get through
fn admit(rate_limiter: &ConnectionRateLimiter, msg: &ClientMsg) -> bool {
    !msg.is_movement() || rate_limiter.check_input()
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = msg.encode().map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
