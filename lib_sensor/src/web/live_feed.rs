use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header::USER_AGENT, HeaderMap};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::web::AppState;

/// `GET /ws`
///
/// The client's user agent becomes the subscriber's log label.
pub async fn ws_handler(ws: WebSocketUpgrade, headers: HeaderMap, State(coordinator): State<AppState>) -> impl IntoResponse {
    let label = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("viewer")
        .to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator, label))
}

/// Pumps the subscriber's queue into the socket until either side goes away.
async fn handle_socket(mut socket: WebSocket, coordinator: AppState, label: String) {
    let mut subscription = coordinator.subscribe(&label);
    let id = subscription.id;

    loop {
        tokio::select! {
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Viewers only listen; anything they send is ignored.
                    Some(Ok(_)) => {}
                }
            }
            outgoing = subscription.receiver.recv() => {
                let Some(message) = outgoing else {
                    // Evicted by the registry for falling behind.
                    log::warn!("Live feed {} ('{}') fell behind and was dropped", id, label);
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let text = match message.to_wire() {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("Failed to encode live message: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    coordinator.unsubscribe(id);
}
