//! Per-connection handler: request routing and event forwarding.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task multiplexes three sources:
//!   1. Requests from the socket → dispatched to the room registry, answered
//!      with an `Ack`
//!   2. Events from rooms this connection joined → forwarded as-is
//!   3. Process-wide events → forwarded unless the connection is bound in
//!      their room (those already arrived through source 2, in order)
//!
//! Player registration is answered here directly; it involves no room.
//! When the socket closes, the connection is removed from every room it
//! joined.

use std::sync::Arc;
use std::time::Instant;

use guessroom_protocol::{
    Ack, ClientMessage, ClientRequest, Codec, Envelope, Payload,
    RegisterPlayer, RoomEvent,
};
use guessroom_room::Peer;
use guessroom_store::PlayerStore;
use guessroom_transport::{
    ConnectionId, FrameReader, FrameWriter, WebSocketLink, WebSocketWriter,
};
use tokio::sync::{broadcast, mpsc};

use crate::GuessroomError;
use crate::server::ServerState;

/// Drop guard that runs the disconnect hook when the handler exits.
///
/// Covers early returns and panics alike. `Drop` is synchronous, so the
/// async cleanup runs in a fire-and-forget task.
struct DisconnectGuard<S: PlayerStore, C: Codec> {
    connection: ConnectionId,
    state: Arc<ServerState<S, C>>,
}

impl<S: PlayerStore, C: Codec> Drop for DisconnectGuard<S, C> {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let events = state.registry.disconnect(connection).await;
            tracing::debug!(
                %connection,
                events = events.len(),
                "disconnect applied"
            );
        });
    }
}

/// Per-connection bookkeeping.
struct Outbox {
    seq: u64,
    start: Instant,
}

impl Outbox {
    fn new() -> Self {
        Self {
            seq: 1,
            start: Instant::now(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        let current = self.seq;
        self.seq += 1;
        current
    }

    fn timestamp(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    link: WebSocketLink,
    state: Arc<ServerState<S, C>>,
) -> Result<(), GuessroomError>
where
    S: PlayerStore,
    C: Codec,
{
    let conn_id = link.id;
    let (mut reader, mut writer) = (link.reader, link.writer);
    tracing::debug!(%conn_id, peer = %link.peer, "handling new connection");

    let (tx, mut room_rx) = mpsc::unbounded_channel::<RoomEvent>();
    let peer = Peer::new(conn_id, tx);
    let mut global_rx = state.registry.subscribe_global();
    let _guard = DisconnectGuard {
        connection: conn_id,
        state: Arc::clone(&state),
    };
    let mut outbox = Outbox::new();

    loop {
        tokio::select! {
            data = reader.recv() => {
                let data = match data {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                handle_request(
                    &mut writer, &state, &peer, &mut room_rx, &mut outbox, &data,
                )
                .await?;
            }
            Some(event) = room_rx.recv() => {
                send_event(&mut writer, &state.codec, &mut outbox, event).await?;
            }
            global = global_rx.recv() => match global {
                Ok(event) => {
                    if !state.registry.is_bound(conn_id, event.room_id).await {
                        send_event(&mut writer, &state.codec, &mut outbox, event)
                            .await?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%conn_id, skipped, "global events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if let Err(e) = writer.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    // _guard drops here → disconnect hook fires.
    Ok(())
}

/// Decodes one client message and answers it with an `Ack`.
async fn handle_request<S, C>(
    writer: &mut WebSocketWriter,
    state: &ServerState<S, C>,
    peer: &Peer,
    room_rx: &mut mpsc::UnboundedReceiver<RoomEvent>,
    outbox: &mut Outbox,
    data: &[u8],
) -> Result<(), GuessroomError>
where
    S: PlayerStore,
    C: Codec,
{
    let ack = match state.codec.decode_client(data) {
        Ok((seq, ClientMessage::Room(request))) => {
            dispatch(writer, state, peer, room_rx, outbox, seq, request).await?
        }
        Ok((seq, ClientMessage::Register(RegisterPlayer { name }))) => {
            match state.registry.register_player(&name).await {
                Ok(player) => Ack::registered(seq, player.id),
                Err(e) => {
                    tracing::debug!(
                        connection = %peer.connection,
                        error = %e,
                        "registration failed"
                    );
                    Ack::rejected(seq, RegisterPlayer::ACTION, e.to_string())
                }
            }
        }
        Err(e) => {
            tracing::debug!(
                connection = %peer.connection,
                error = %e,
                "unusable frame"
            );
            Ack::rejected(e.seq().unwrap_or(0), "unknown", e.to_string())
        }
    };
    send_payload(writer, &state.codec, outbox, Payload::Ack(ack)).await
}

/// Runs one room request and builds its `Ack`.
///
/// Room events caused by the request are flushed first, so the requester
/// sees the new state by the time it learns the outcome.
async fn dispatch<S, C>(
    writer: &mut WebSocketWriter,
    state: &ServerState<S, C>,
    peer: &Peer,
    room_rx: &mut mpsc::UnboundedReceiver<RoomEvent>,
    outbox: &mut Outbox,
    seq: u64,
    ClientRequest { room_id, action }: ClientRequest,
) -> Result<Ack, GuessroomError>
where
    S: PlayerStore,
    C: Codec,
{
    let name = action.name();
    let result = state
        .registry
        .dispatch(room_id, peer.clone(), action)
        .await;

    while let Ok(event) = room_rx.try_recv() {
        send_event(writer, &state.codec, outbox, event).await?;
    }

    Ok(match result {
        Ok(_) => Ack::ok(seq, name),
        Err(e) => {
            tracing::debug!(
                connection = %peer.connection,
                %room_id,
                action = name,
                error = %e,
                "request failed"
            );
            Ack::rejected(seq, name, e.to_string())
        }
    })
}

async fn send_event(
    writer: &mut WebSocketWriter,
    codec: &impl Codec,
    outbox: &mut Outbox,
    event: RoomEvent,
) -> Result<(), GuessroomError> {
    send_payload(writer, codec, outbox, Payload::Event(event)).await
}

async fn send_payload(
    writer: &mut WebSocketWriter,
    codec: &impl Codec,
    outbox: &mut Outbox,
    payload: Payload,
) -> Result<(), GuessroomError> {
    let envelope = Envelope {
        seq: outbox.next_seq(),
        timestamp: outbox.timestamp(),
        payload,
    };
    let bytes = codec.encode(&envelope)?;
    writer.send(&bytes).await?;
    Ok(())
}
