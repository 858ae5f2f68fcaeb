//! `/events` WebSocket stream.
//!
//! Every relay event is forwarded as one JSON text frame. Lagging
//! subscribers skip what they missed and keep going. Client frames are
//! ignored except close.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::control::handlers::ControlState;
use crate::relay::EventRelay;

pub async fn events_ws(State(state): State<ControlState>, ws: WebSocketUpgrade) -> Response {
    let relay = state.supervisor.relay().clone();
    ws.on_upgrade(move |socket| forward_events(socket, relay))
}

async fn forward_events(socket: WebSocket, relay: EventRelay) {
    let mut events = relay.subscribe();
    let (mut sink, mut incoming) = socket.split();
    tracing::debug!(listeners = relay.listener_count(), "Event stream client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode core event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream client lagging, dropped events");
                }
                Err(RecvError::Closed) => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Event stream client disconnected");
}
