//! `/api/live` WebSocket handler.
//!
//! Connection lifecycle:
//! 1. Upgrade and subscribe to the bridge
//! 2. Send a `connected` message
//! 3. Relay bus events and answer pings until either side stops
//! 4. Drop the subscription

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::domain::foundation::Timestamp;

use super::event_bridge::DashboardBridge;
use super::messages::{ClientMessage, ConnectedMessage, LaggedMessage, PongMessage, ServerMessage};

/// GET /api/live - Upgrade to the dashboard event stream
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(bridge): State<Arc<DashboardBridge>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, bridge))
}

async fn handle_socket(socket: WebSocket, bridge: Arc<DashboardBridge>) {
    let (mut sender, mut receiver) = socket.split();
    let client_id = Uuid::new_v4().to_string();
    let mut updates = bridge.subscribe();

    let connected = ServerMessage::Connected(ConnectedMessage {
        client_id: client_id.clone(),
        timestamp: Timestamp::now().as_datetime().to_rfc3339(),
    });
    if let Err(e) = send_message(&mut sender, &connected).await {
        tracing::debug!(client_id = %client_id, error = %e, "client left before connect");
        return;
    }
    tracing::info!(
        client_id = %client_id,
        clients = bridge.client_count(),
        "dashboard client connected"
    );

    // Pongs are produced by the receive side and written by the send side
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<PongMessage>();

    let mut send_task = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    update = updates.recv() => match update {
                        Ok(update) => ServerMessage::Event(update),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                client_id = %client_id,
                                skipped,
                                "dashboard client lagging"
                            );
                            ServerMessage::Lagged(LaggedMessage { skipped })
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    pong = pong_rx.recv() => match pong {
                        Some(pong) => ServerMessage::Pong(pong),
                        None => break,
                    },
                };
                if let Err(e) = send_message(&mut sender, &message).await {
                    tracing::debug!(client_id = %client_id, error = %e, "send failed, closing");
                    break;
                }
            }
        })
    };

    let mut recv_task = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => {
                            if pong_tx.send(PongMessage::now()).is_err() {
                                break;
                            }
                        }
                        Err(_) => {
                            tracing::debug!(
                                client_id = %client_id,
                                "ignoring unknown client message"
                            )
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    // Protocol pings are answered by axum
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(client_id = %client_id, error = %e, "receive error");
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::info!(client_id = %client_id, "dashboard client disconnected");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}
