//! WebSocket relay server
//!
//! Handles the TCP accept loop and spawns one session task per viewer.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::relay::{FrameSlot, SessionRegistry};
use crate::server::config::ServerConfig;
use crate::server::conn;

/// Frame relay server
///
/// Owns no pipeline state itself: the frame slot and session registry are
/// shared with the ingest side and handed in at construction.
pub struct RelayServer {
    config: ServerConfig,
    slot: Arc<FrameSlot>,
    registry: Arc<SessionRegistry>,
    connection_semaphore: Option<Arc<Semaphore>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl RelayServer {
    /// Create a new server over a shared frame slot and session registry
    pub fn new(
        config: ServerConfig,
        slot: Arc<FrameSlot>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            slot,
            registry,
            connection_semaphore,
            local_addr: Mutex::new(None),
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Address the listener actually bound
    ///
    /// `None` until `run` has bound the socket. With a port-0 bind address
    /// this is the way to learn the assigned port.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Run the server until the token is cancelled
    ///
    /// Cancellation propagates to every session task, so viewers receive a
    /// close frame instead of a dead socket.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(addr = %local_addr, "Relay server listening");

        let stats_handle = self.spawn_stats_task();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &cancel) => result,
        };

        if let Some(handle) = stats_handle {
            handle.abort();
        }

        result
    }

    /// Periodic one-line stats log; disabled when the interval is zero
    fn spawn_stats_task(&self) -> Option<JoinHandle<()>> {
        if self.config.stats_interval.is_zero() {
            return None;
        }

        let interval = self.config.stats_interval;
        let slot = Arc::clone(&self.slot);
        let registry = Arc::clone(&self.registry);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip immediate first tick.
            loop {
                ticker.tick().await;
                tracing::info!(
                    viewers = registry.active_count(),
                    generation = slot.generation(),
                    "Relay stats"
                );
            }
        }))
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, cancel).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        cancel: &CancellationToken,
    ) {
        // Check viewer limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: viewer limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(peer = %peer_addr, error = %e, "Failed to configure socket");
            return;
        }

        tracing::debug!(peer = %peer_addr, "New connection");

        let config = self.config.clone();
        let slot = Arc::clone(&self.slot);
        let registry = Arc::clone(&self.registry);
        let cancel = cancel.child_token();

        tokio::spawn(async move {
            // Held for the session lifetime; releasing it frees a slot
            // under the viewer limit
            let _permit = permit;

            if let Err(e) = conn::serve(socket, peer_addr, config, slot, registry, cancel).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Session error");
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn start_server(
        config: ServerConfig,
        frame_capacity: usize,
    ) -> (
        Arc<RelayServer>,
        Arc<FrameSlot>,
        CancellationToken,
        JoinHandle<()>,
        String,
    ) {
        let slot = Arc::new(FrameSlot::new());
        let registry = Arc::new(SessionRegistry::new(frame_capacity));
        let server = Arc::new(RelayServer::new(config, Arc::clone(&slot), registry));
        let cancel = CancellationToken::new();

        let server2 = Arc::clone(&server);
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move {
            server2.run(cancel2).await.unwrap();
        });

        // Wait for the server to bind
        tokio::time::sleep(Duration::from_millis(50)).await;
        let addr = server.local_addr().await.unwrap();
        let url = format!("ws://{}", addr);

        (server, slot, cancel, handle, url)
    }

    fn test_config() -> ServerConfig {
        ServerConfig::with_addr("127.0.0.1:0".parse().unwrap())
    }

    /// Read messages until a binary frame arrives, skipping pings
    async fn next_binary(ws: &mut WsClient) -> Bytes {
        loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => return data,
                Some(Ok(_)) => continue,
                other => panic!("connection ended before a frame arrived: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_viewer_receives_published_frame() {
        let (_server, slot, cancel, handle, url) = start_server(test_config(), 1024).await;

        let (mut ws, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        slot.publish(Bytes::from_static(b"frame-1"));

        let data = tokio::time::timeout(Duration::from_secs(5), next_binary(&mut ws))
            .await
            .unwrap();
        assert_eq!(&data[..], b"frame-1");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_late_joiner_gets_current_frame() {
        let (_server, slot, cancel, handle, url) = start_server(test_config(), 1024).await;

        // Published before the viewer connects
        slot.publish(Bytes::from_static(b"live"));

        let (mut ws, _) = connect_async(&url).await.unwrap();

        let data = tokio::time::timeout(Duration::from_secs(5), next_binary(&mut ws))
            .await
            .unwrap();
        assert_eq!(&data[..], b"live");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_delivered_once_per_generation() {
        let (_server, slot, cancel, handle, url) = start_server(test_config(), 1024).await;

        let (mut ws, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        slot.publish(Bytes::from_static(b"only"));

        let data = tokio::time::timeout(Duration::from_secs(5), next_binary(&mut ws))
            .await
            .unwrap();
        assert_eq!(&data[..], b"only");

        // No new generation was published, so nothing further arrives
        let second = tokio::time::timeout(Duration::from_millis(200), next_binary(&mut ws)).await;
        assert!(second.is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_dropped_session_survives() {
        // Sessions accept at most 16-byte frames
        let (server, slot, cancel, handle, url) = start_server(test_config(), 16).await;

        // Already oversized when the viewer joins
        slot.publish(Bytes::from(vec![0xEE; 32]));

        let (mut ws, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The session dropped the big frame but stayed up; a frame that
        // fits goes through
        slot.publish(Bytes::from_static(b"small"));

        let data = tokio::time::timeout(Duration::from_secs(5), next_binary(&mut ws))
            .await
            .unwrap();
        assert_eq!(&data[..], b"small");
        assert_eq!(server.registry().active_count(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_viewer_torn_down_by_idle_deadline() {
        let config = test_config().idle_timeout(Duration::from_millis(300));
        let (server, _slot, cancel, handle, url) = start_server(config, 1024).await;

        let (ws, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.registry().active_count(), 1);

        // No frames in flight and no client traffic; only the deadline fires
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(server.registry().active_count(), 0);

        drop(ws);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_viewer_that_stops_reading_is_torn_down() {
        // A connected viewer that never drains its socket: the kernel
        // buffers fill, an outbound send stalls, and the bounded write
        // tears the session down where the idle deadline cannot run
        let config = test_config().idle_timeout(Duration::from_millis(500));
        let (server, slot, cancel, handle, url) = start_server(config, 2 * 1024 * 1024).await;

        let (ws, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.registry().active_count(), 1);

        // Push far more than the socket buffers absorb while the client
        // reads nothing
        let big = Bytes::from(vec![0xAB; 1024 * 1024]);
        for _ in 0..16 {
            slot.publish(big.clone());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(server.registry().active_count(), 0);

        drop(ws);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_viewer_count_drops_on_disconnect() {
        let (server, _slot, cancel, handle, url) = start_server(test_config(), 1024).await;

        let (ws, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.registry().active_count(), 1);

        drop(ws);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.registry().active_count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_viewer_limit_rejects_second_connection() {
        let config = test_config().max_connections(1);
        let (server, _slot, cancel, handle, url) = start_server(config, 1024).await;

        let (_ws1, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.registry().active_count(), 1);

        // The listener drops the socket before the handshake completes
        let second = connect_async(&url).await;
        assert!(second.is_err());
        assert_eq!(server.registry().active_count(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
