mod messages;
mod session;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
};
use cuevote_core::CommandError;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;

pub use messages::*;
pub use session::*;

use crate::{Router, ServerContext};

async fn gateway(ws: WebSocketUpgrade, context: ServerContext) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, context))
}

async fn handle_socket(socket: WebSocket, context: ServerContext) {
    let (mut sender, mut receiver) = socket.split();
    let (outgoing, mut pending) = mpsc::unbounded_channel::<ServerMessage>();

    let send_task = tokio::spawn(async move {
        while let Some(message) = pending.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize gateway message: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session = GatewaySession::new(context, outgoing);
    info!("Gateway connection opened as {}", session.identity().key());

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match ClientMessage::parse(&text) {
                Ok(message) => session.handle(message).await,
                Err(e) => {
                    debug!("Malformed gateway message: {}", e);
                    session.send(ServerMessage::error(&CommandError::validation(
                        "Invalid message format.",
                    )));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("Gateway connection closed for {}", session.identity().key());

    drop(session);
    send_task.abort();
}

pub fn router() -> Router {
    Router::new().route("/gateway", get(gateway))
}
