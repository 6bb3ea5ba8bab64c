use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::OutboundEvent,
    services::coordinator,
    state::{SharedState, registry::ConnectionHandle},
};

/// Handle the full lifecycle of a display or controller WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundEvent>();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while a command awaits remote data.
    let writer_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(event) = outbound_rx.recv() => match event.to_frame() {
                    Ok(frame) => Message::Text(frame.into()),
                    Err(err) => {
                        warn!(event = %event.event, error = %err, "failed to serialize outbound event");
                        continue;
                    }
                },
                Some(control) = control_rx.recv() => control,
                else => break,
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let id = Uuid::new_v4();
    coordinator::on_connect(
        &state,
        ConnectionHandle {
            id,
            tx: outbound_tx,
        },
    )
    .await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(id = %id, payload = %text.as_str(), "received client message");
                coordinator::on_message(&state, id, text.as_str()).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = control_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(id = %id, "client closed connection");
                let _ = control_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!(id = %id, "ignoring binary frame");
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(id = %id, error = %err, "websocket error");
                break;
            }
        }
    }

    // Dropping the registry entry releases the last outbound sender.
    coordinator::on_disconnect(&state, id).await;
    finalize(writer_task, control_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, control_tx: mpsc::UnboundedSender<Message>) {
    drop(control_tx);
    let _ = writer_task.await;
}
