use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::classroom::{ClassroomGateway, ClientMessage};

pub async fn handle_classroom_websocket(websocket: WebSocket, gateway: Arc<ClassroomGateway>) {
    tracing::info!("New classroom WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = gateway.register(tx).await;

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                handle_websocket_message(&gateway, connection_id, message).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    gateway.disconnect(connection_id).await;
    sender_task.abort();
    tracing::info!("Classroom WebSocket connection closed");
}

async fn handle_websocket_message(
    gateway: &Arc<ClassroomGateway>,
    connection_id: uuid::Uuid,
    message: Message,
) {
    if let Ok(text) = message.to_str() {
        tracing::debug!("Received classroom message: {}", text);

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(client_message) => {
                gateway.handle_message(connection_id, client_message).await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_message = %text,
                    "Failed to parse classroom message"
                );
            }
        }
    }
}
