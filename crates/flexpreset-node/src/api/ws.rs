//! WebSocket push endpoints.
//!
//! One socket per observer; every broadcast event is fanned out as an
//! `{event, payload}` JSON frame. Each namespace has its own channel.
//! Delivery is fire-and-forget — a lagging client skips events rather
//! than stalling the broadcaster.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use flexpreset_store::PresetService;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::AppState;

/// Preset event stream for UI observers.
pub async fn events_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_events(socket, state.service))
}

/// Prompt list event stream.
pub async fn prompt_events_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_events(socket, state.prompts))
}

async fn handle_events(mut socket: WebSocket, service: Arc<PresetService>) {
    let subscription = service.subscribe();
    tracing::debug!("Observer {} connected", subscription.id);
    let mut events = BroadcastStream::new(subscription.receiver);

    loop {
        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        let frame = event.to_frame().to_string();
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        tracing::warn!("Observer lagged, skipped {} events", skipped);
                    }
                    None => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
    tracing::debug!("Observer disconnected");
}
