use crate::service::{EventDispatcher, RouteService};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(service): State<Arc<RouteService>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, service))
}

/// One actor per peer: a writer task drains the peer's mailbox into the
/// socket while this task reads frames and dispatches them in order.
async fn handle_websocket(socket: WebSocket, service: Arc<RouteService>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = service.connect(tx).await;
    let dispatcher = EventDispatcher::new(service.clone());

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.dispatch(&connection_id, &text).await;
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => dispatcher.dispatch(&connection_id, text).await,
                        Err(_) => {
                            tracing::debug!(connection_id = %connection_id, "Ignoring non-UTF-8 binary frame");
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(connection_id = %connection_id, reason = ?frame, "Client initiated close");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    None => break,
                }
            }
            // Mailbox closed, e.g. the connection was swept as stale
            _ = &mut writer => break,
        }
    }

    writer.abort();
    service.disconnect(&connection_id);
}
