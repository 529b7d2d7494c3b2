//! Per-connection pumps between a WebSocket and a hub.

use std::fmt::Display;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::config::SessionSettings;
use crate::hub::{ClientInfo, HubHandle, Outbound};

/// Register the socket with `hub` and pump messages until either side ends.
pub async fn serve_socket(socket: WebSocket, user_token: String, hub: HubHandle, settings: SessionSettings) {
    let client = ClientInfo {
        id: hub.next_client_id(),
        user_token,
    };
    let (queue_tx, queue_rx) = mpsc::channel(settings.send_queue_capacity);
    hub.register(client.clone(), queue_tx);

    let (sink, stream) = socket.split();
    let (writer_done_tx, writer_done_rx) = oneshot::channel::<()>();

    tokio::spawn(write_pump(
        sink,
        queue_rx,
        client.clone(),
        hub.clone(),
        settings.clone(),
        writer_done_tx,
    ));
    let reader = tokio::spawn(read_pump(
        stream,
        client.clone(),
        hub.clone(),
        settings,
        writer_done_rx,
    ));

    tracing::info!(
        channel = hub.handler().name(),
        id = client.id.0,
        "{} connected",
        client.user_token
    );
    hub.handler().on_register(&client, &hub);

    if let Err(e) = reader.await {
        tracing::error!(id = client.id.0, "read pump failed: {}", e);
        hub.unregister(client.id);
    }
    tracing::info!(
        channel = hub.handler().name(),
        id = client.id.0,
        "{} disconnected",
        client.user_token
    );
}

async fn flush_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Forward inbound text to the channel handler until the peer goes away,
/// goes quiet for `pong_wait`, or the outbound pump exits. Always ends by
/// unregistering the client.
///
/// With a debounce window the first message of a burst opens the window and
/// only the latest payload seen when it closes is handed over.
pub(crate) async fn read_pump<S, E>(
    mut stream: S,
    client: ClientInfo,
    hub: HubHandle,
    settings: SessionSettings,
    mut writer_done: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let handler = hub.handler().clone();
    // A zero window disables debouncing
    let debounce = handler.debounce().filter(|window| !window.is_zero());
    let mut pending: Option<String> = None;
    let mut flush_at: Option<Instant> = None;
    let mut deadline = Instant::now() + settings.pong_wait;

    loop {
        tokio::select! {
            _ = &mut writer_done => break,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::debug!(id = client.id.0, "read deadline passed");
                break;
            }
            _ = flush_due(flush_at) => {
                flush_at = None;
                if let Some(text) = pending.take() {
                    handler.on_message(&client, &text, &hub);
                }
            }
            frame = stream.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(id = client.id.0, "read error: {}", e);
                        break;
                    }
                    None => break,
                };
                deadline = Instant::now() + settings.pong_wait;
                match msg {
                    Message::Text(text) => match debounce {
                        Some(window) => {
                            pending = Some(text.as_str().to_owned());
                            if flush_at.is_none() {
                                flush_at = Some(Instant::now() + window);
                            }
                        }
                        None => handler.on_message(&client, text.as_str(), &hub),
                    },
                    Message::Close(_) => break,
                    _ => {} // Ping/pong/binary
                }
            }
        }
    }

    hub.unregister(client.id);
}

async fn send_with_deadline<S>(sink: &mut S, msg: Message, settings: &SessionSettings) -> bool
where
    S: Sink<Message> + Unpin,
{
    matches!(
        tokio::time::timeout(settings.write_wait, sink.send(msg)).await,
        Ok(Ok(()))
    )
}

/// Drain the client's queue into the socket, one rendered frame per wakeup,
/// pinging every `ping_period`. A closed queue ends with a close frame; a
/// failed or late write unregisters the client.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Outbound>,
    client: ClientInfo,
    hub: HubHandle,
    settings: SessionSettings,
    // Dropped on exit, which stops the read pump
    _done: oneshot::Sender<()>,
) where
    S: Sink<Message> + Unpin,
{
    let handler = hub.handler().clone();
    let mut ping = tokio::time::interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        tokio::select! {
            item = queue.recv() => {
                let Some(first) = item else {
                    // Hub closed the queue
                    let _ = send_with_deadline(&mut sink, Message::Close(None), &settings).await;
                    break;
                };
                let mut batch = vec![first];
                while let Ok(more) = queue.try_recv() {
                    batch.push(more);
                }
                let Some(text) = handler.render_outbound(&client, batch) else {
                    continue;
                };
                if !send_with_deadline(&mut sink, Message::Text(text.into()), &settings).await {
                    tracing::debug!(id = client.id.0, "write failed");
                    hub.unregister(client.id);
                    break;
                }
            }
            _ = ping.tick() => {
                if !send_with_deadline(&mut sink, Message::Ping(Vec::new().into()), &settings).await {
                    hub.unregister(client.id);
                    break;
                }
            }
        }
    }
}
