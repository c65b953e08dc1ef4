use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use mona_core::processors::{ChannelSubscriber, ConnectionId};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use crate::state::AppState;

/// `GET /ws`: WebSocket notification stream.
///
/// Every registered connection receives one JSON text frame per relayed
/// event. Nothing is sent on connect; frames from the client are ignored.
pub(super) async fn subscribe_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_subscriber_ws(socket, state))
}

/// Drive one connection until either side goes away.
///
/// The hub pushes frames into a bounded channel; a writer task drains it
/// onto the socket while a reader task watches for the client closing.
async fn handle_subscriber_ws(socket: WebSocket, state: AppState) {
    let hub = Arc::clone(state.relay.hub());
    let hub_config = state.relay.hub_config();

    let (subscriber, frames) = ChannelSubscriber::channel(hub_config.subscriber_buffer);
    let id = hub.register(Arc::new(subscriber));
    tracing::info!(connection = %id, subscribers = hub.len(), "WS: client connected");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_frames(sink, frames, hub_config.send_timeout, id));
    let mut reader = tokio::spawn(read_until_closed(stream, id));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.deregister(id);
    tracing::info!(connection = %id, subscribers = hub.len(), "WS: client disconnected");
}

/// Forward queued frames to the socket. Stops on the first failed send.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<Arc<str>>,
    send_timeout: Duration,
    id: ConnectionId,
) {
    while let Some(frame) = frames.recv().await {
        let message = Message::Text(frame.to_string().into());
        match timeout(send_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection = %id, error = %e, "WS: send failed");
                break;
            }
            Err(_) => {
                tracing::debug!(connection = %id, "WS: send timed out");
                break;
            }
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Consume client frames until close or error.
async fn read_until_closed(mut stream: SplitStream<WebSocket>, id: ConnectionId) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "WS: receive failed");
                break;
            }
        }
    }
}
