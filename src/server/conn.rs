//! Per-viewer WebSocket session
//!
//! One task per viewer. The task waits on the frame slot, the keepalive
//! ticker, inbound WebSocket traffic, and shutdown at the same time, so a
//! session never polls. Delivery decisions are delegated to the session's
//! `DeliveryState`; this module only moves bytes.
//!
//! Outbound writes are bounded by the idle timeout; a viewer that stops
//! draining its socket is treated as gone.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::relay::frame::EncodedFrame;
use crate::relay::{FrameSlot, SessionId, SessionRegistry};
use crate::server::config::ServerConfig;
use crate::session::{Delivery, DeliveryState};
use crate::stats::SessionStats;

/// Serve one viewer connection to completion
///
/// Performs the WebSocket handshake, registers the session, runs the
/// delivery loop until the viewer disconnects, the link goes idle, or the
/// server shuts down, then deregisters the session. Exactly one
/// deregistration happens per successful registration, on every exit path.
pub async fn serve(
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    slot: Arc<FrameSlot>,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ws_config = WebSocketConfig::default();
    // Viewers only send control traffic, never frame data
    ws_config.max_message_size = Some(config.max_inbound_message);
    ws_config.max_frame_size = Some(config.max_inbound_message);

    let handshake = accept_async_with_config(socket, Some(ws_config));
    let mut ws = match tokio::time::timeout(config.handshake_timeout, handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(Error::HandshakeTimeout),
    };

    let session_id = registry.register(peer_addr).await;
    let mut delivery = DeliveryState::new(registry.frame_capacity());
    let mut stats = SessionStats::new();

    let result = run_session(
        &mut ws,
        &config,
        &slot,
        session_id,
        &mut delivery,
        &mut stats,
        &cancel,
    )
    .await;

    registry.deregister(session_id).await;
    tracing::debug!(
        session_id = session_id,
        frames_sent = stats.frames_sent,
        bytes_sent = stats.bytes_sent,
        skips = stats.skips,
        capacity_drops = stats.capacity_drops,
        "Session finished"
    );

    result
}

async fn run_session(
    ws: &mut WebSocketStream<TcpStream>,
    config: &ServerConfig,
    slot: &FrameSlot,
    session_id: SessionId,
    delivery: &mut DeliveryState,
    stats: &mut SessionStats,
    cancel: &CancellationToken,
) -> Result<()> {
    // Subscribing marks the slot's current value as seen; the explicit
    // snapshot below covers the frame, if any, a late joiner starts from.
    let mut frames = slot.subscribe();

    // A peer that cannot drain a write within the idle window is gone
    let send_limit = config.idle_timeout;

    let initial = slot.snapshot();
    if initial.is_some() {
        deliver(ws, delivery, initial.as_ref(), stats, session_id, send_limit).await?;
    }

    let mut ping = tokio::time::interval(config.ping_interval);
    ping.tick().await; // Skip immediate first tick.

    let idle = tokio::time::sleep(config.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                close_bounded(ws, send_limit).await;
                return Ok(());
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    // Publisher side dropped; no further frames will arrive
                    close_bounded(ws, send_limit).await;
                    return Ok(());
                }
                let snapshot = frames.borrow_and_update().clone();
                deliver(ws, delivery, snapshot.as_ref(), stats, session_id, send_limit).await?;
            }
            _ = ping.tick() => {
                send_bounded(ws, Message::Ping(vec![].into()), send_limit).await?;
            }
            inbound = ws.next() => {
                let message = match inbound {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => return Err(e.into()),
                    // Socket closed without a close frame
                    None => return Ok(()),
                };

                idle.as_mut()
                    .reset(tokio::time::Instant::now() + config.idle_timeout);

                match message {
                    Message::Close(_) => return Ok(()),
                    Message::Ping(payload) => {
                        send_bounded(ws, Message::Pong(payload), send_limit).await?;
                    }
                    Message::Text(_) | Message::Binary(_) => {
                        tracing::debug!(session_id = session_id, "Ignoring viewer data");
                    }
                    // Pongs only refresh the idle deadline
                    _ => {}
                }
            }
            () = &mut idle => {
                tracing::debug!(session_id = session_id, "Idle timeout, closing");
                close_bounded(ws, send_limit).await;
                return Ok(());
            }
        }
    }
}

/// Run one write opportunity against the delivery state machine
///
/// An oversized frame is counted and logged but does not end the session;
/// the viewer stays connected and picks up the next frame that fits.
async fn deliver(
    ws: &mut WebSocketStream<TcpStream>,
    delivery: &mut DeliveryState,
    snapshot: Option<&EncodedFrame>,
    stats: &mut SessionStats,
    session_id: SessionId,
    send_limit: Duration,
) -> Result<()> {
    match delivery.on_write_ready(snapshot) {
        Ok(Delivery::Send { generation, bytes }) => {
            let len = bytes.len() as u64;
            send_bounded(ws, Message::Binary(bytes), send_limit).await?;
            stats.frames_sent += 1;
            stats.bytes_sent += len;
            tracing::trace!(
                session_id = session_id,
                generation = generation,
                len = len,
                "Frame sent"
            );
        }
        Ok(Delivery::Skip) => {
            stats.skips += 1;
        }
        Err(e) => {
            stats.capacity_drops += 1;
            tracing::warn!(session_id = session_id, error = %e, "Frame dropped");
        }
    }

    Ok(())
}

/// Send one message with an upper bound on how long the peer may take to
/// accept it
///
/// A timed-out send leaves the stream torn mid-frame, so the session must
/// not keep using it; expiry surfaces as a transport failure.
async fn send_bounded(
    ws: &mut WebSocketStream<TcpStream>,
    message: Message,
    limit: Duration,
) -> Result<()> {
    match tokio::time::timeout(limit, ws.send(message)).await {
        Ok(sent) => sent.map_err(Into::into),
        Err(_) => Err(Error::SendTimeout),
    }
}

/// Best-effort close, bounded like any other write
async fn close_bounded(ws: &mut WebSocketStream<TcpStream>, limit: Duration) {
    let _ = tokio::time::timeout(limit, ws.close(None)).await;
}
