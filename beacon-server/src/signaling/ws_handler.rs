use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use beacon_core::{ClientMessage, ServerMessage};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::signaling::RelayState;
use crate::{Coordinator, Heartbeat};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.coordinator, state.heartbeat))
}

async fn handle_socket(socket: WebSocket, coordinator: Coordinator, heartbeat: Heartbeat) {
    let (sender, receiver) = socket.split();
    run_connection(sender, receiver, coordinator, heartbeat).await;
}

/// Drives one connection until the client closes, stops answering, or the
/// outbound side fails. The send half pings every `ping_interval`; the
/// receive half gives up when nothing arrives within `ping_timeout`.
pub(crate) async fn run_connection<W, R>(
    mut sender: W,
    mut receiver: R,
    coordinator: Coordinator,
    heartbeat: Heartbeat,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = coordinator.connect(tx);
    info!("New WebSocket connection: {}", conn_id);

    let mut send_task = tokio::spawn(async move {
        let mut ping = time::interval_at(
            Instant::now() + heartbeat.ping_interval,
            heartbeat.ping_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    match msg.to_text() {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => {
                            error!("Failed to serialize server message: {}", e);
                            continue;
                        }
                    }
                }
                _ = ping.tick() => Message::Ping(Bytes::new()),
            };

            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let coordinator = coordinator.clone();

        async move {
            loop {
                let msg = match time::timeout(heartbeat.ping_timeout, receiver.next()).await {
                    Ok(Some(Ok(msg))) => msg,
                    Ok(_) => break,
                    Err(_) => {
                        warn!(
                            "No frame from {} for {:?}, closing",
                            conn_id, heartbeat.ping_timeout
                        );
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match ClientMessage::parse(text.as_str()) {
                        Ok(msg) => coordinator.handle(conn_id, msg).await,
                        Err(e) => coordinator.reject(conn_id, e),
                    },
                    Message::Close(_) => break,
                    // Pongs only reset the timeout.
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    coordinator.disconnect(conn_id).await;
    info!("WebSocket disconnected: {}", conn_id);
}
