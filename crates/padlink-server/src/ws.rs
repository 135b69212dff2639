//! WebSocket session plumbing.
//!
//! One task per connection reads inbound frames and feeds them to the driver;
//! a second task pumps an outbound channel into the socket sink so the sink is
//! never shared. All routing decisions live in the driver, this module only
//! moves bytes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use padlink_core::Environment;
use padlink_proto::ServerMessage;
use tokio::sync::mpsc;

use crate::{
    SharedState,
    driver::{LogLevel, ServerAction, ServerEvent},
};

pub(crate) async fn handle_socket(state: Arc<SharedState>, socket: WebSocket) {
    let session_id = state.env.random_u64();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.senders.write().await.insert(session_id, tx);

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    dispatch(&state, ServerEvent::ConnectionAccepted { session_id }).await;

    let mut close_reason = "connection closed".to_string();
    while let Some(received) = stream.next().await {
        match received {
            Ok(Message::Text(text)) => {
                dispatch(&state, ServerEvent::FrameReceived { session_id, text }).await;
            },
            Ok(Message::Close(_)) => {
                close_reason = "peer closed".to_string();
                break;
            },
            // Binary, ping, and pong frames carry no protocol traffic.
            Ok(_) => {},
            Err(err) => {
                close_reason = format!("socket error: {err}");
                break;
            },
        }
    }

    state.senders.write().await.remove(&session_id);
    dispatch(&state, ServerEvent::ConnectionClosed { session_id, reason: close_reason }).await;
    writer.abort();
}

/// Run one event through the driver and execute the resulting actions.
pub(crate) async fn dispatch(state: &SharedState, event: ServerEvent) {
    let result = {
        let mut driver = state.driver.lock().await;
        driver.process_event(event)
    };

    match result {
        Ok(actions) => execute_actions(state, actions).await,
        Err(err) => tracing::warn!("driver rejected event: {err}"),
    }
}

async fn execute_actions(state: &SharedState, actions: Vec<ServerAction>) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, message } => {
                send_json(state, session_id, &message).await;
            },
            ServerAction::BroadcastToRoom { code, message, exclude } => {
                let targets = { state.driver.lock().await.sessions_in_room(&code) };
                for target in targets {
                    if Some(target) == exclude {
                        continue;
                    }
                    send_json(state, target, &message).await;
                }
            },
            ServerAction::ProbeSession { session_id } => {
                send_raw(state, session_id, Message::Ping(Vec::new())).await;
            },
            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!(session_id, "closing connection: {reason}");
                send_raw(state, session_id, Message::Close(None)).await;
                state.senders.write().await.remove(&session_id);
            },
            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
    }
}

async fn send_json(state: &SharedState, session_id: u64, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => send_raw(state, session_id, Message::Text(text)).await,
        Err(err) => tracing::error!("failed to encode outbound message: {err}"),
    }
}

async fn send_raw(state: &SharedState, session_id: u64, message: Message) {
    let senders = state.senders.read().await;
    if let Some(tx) = senders.get(&session_id) {
        if tx.send(message).is_err() {
            tracing::debug!(session_id, "outbound channel already closed");
        }
    }
}
