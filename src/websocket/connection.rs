use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broadcast::SOCKET_QUEUE_CAPACITY;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::server::QuizServer;

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<QuizServer>, addr: SocketAddr) {
    let socket_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(SOCKET_QUEUE_CAPACITY);

    server.register_socket(socket_id, tx);
    tracing::info!(%socket_id, client_addr = %addr, "WebSocket connection established");

    // Outbound pump: one queue per socket keeps PIN-group ordering intact.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(message.as_ref()) {
                Ok(text) => text,
                Err(error) => {
                    tracing::error!(%socket_id, %error, "Failed to serialize outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let receive_server = Arc::clone(&server);
    let receive_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(error) => {
                    tracing::debug!(%socket_id, %error, "WebSocket read error");
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    let max_size = receive_server.options().max_message_size;
                    if text.len() > max_size {
                        tracing::warn!(%socket_id, size = text.len(), max_size, "Frame exceeds size limit");
                        receive_server.send_protocol_error(
                            socket_id,
                            &format!("frame too large ({} bytes, max {max_size})", text.len()),
                        );
                        continue;
                    }
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            receive_server.handle_client_message(socket_id, message).await;
                        }
                        Err(error) => {
                            tracing::debug!(%socket_id, %error, "Rejected malformed frame");
                            receive_server.send_protocol_error(
                                socket_id,
                                &format!("malformed frame: {error}"),
                            );
                        }
                    }
                }
                Message::Close(_) => {
                    break;
                }
                // axum answers pings; binary frames have no meaning here.
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
    }

    server.handle_socket_closed(socket_id).await;
    tracing::info!(%socket_id, "WebSocket connection closed");
}
