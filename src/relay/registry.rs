//! Viewer session registry
//!
//! Tracks the set of connected viewers. The active count is a plain atomic
//! so the admission gate can read it on every frame arrival without touching
//! the session map; the map itself is only written on connect and
//! disconnect.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;

/// Handle identifying a registered viewer session
pub type SessionId = u64;

/// Per-session record kept while the viewer is connected
#[derive(Debug, Clone)]
struct SessionInfo {
    peer_addr: SocketAddr,
    connected_at: Instant,
}

/// Registry of active viewer sessions
///
/// `register` and `deregister` serialize with each other; deliveries never
/// take the map lock. Deregistering the same id twice decrements the count
/// exactly once.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionInfo>>,
    active: AtomicUsize,
    next_id: AtomicU64,
    frame_capacity: usize,
}

impl SessionRegistry {
    /// Create a registry whose sessions are bounded to `frame_capacity`
    /// bytes per delivered frame
    pub fn new(frame_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            frame_capacity,
        }
    }

    /// Frame size bound applied to every session
    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }

    /// Register a new viewer session
    ///
    /// Returns the id the session keeps for its lifetime.
    pub async fn register(&self, peer_addr: SocketAddr) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let viewers = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                id,
                SessionInfo {
                    peer_addr,
                    connected_at: Instant::now(),
                },
            );
            self.active.fetch_add(1, Ordering::Relaxed) + 1
        };

        tracing::info!(
            session_id = id,
            peer = %peer_addr,
            viewers = viewers,
            "Viewer connected"
        );

        id
    }

    /// Remove a viewer session
    ///
    /// Safe to call more than once for the same id; only the call that
    /// actually removes the record decrements the active count.
    pub async fn deregister(&self, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(&id);
            if removed.is_some() {
                self.active.fetch_sub(1, Ordering::Relaxed);
            }
            removed
        };

        if let Some(info) = removed {
            tracing::info!(
                session_id = id,
                peer = %info.peer_addr,
                duration_ms = info.connected_at.elapsed().as_millis() as u64,
                viewers = self.active.load(Ordering::Relaxed),
                "Viewer disconnected"
            );
        }
    }

    /// Number of connected viewers, read by the admission gate
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Whether a session id is currently registered
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000)
    }

    #[tokio::test]
    async fn test_register_deregister() {
        let registry = SessionRegistry::new(1024);
        assert_eq!(registry.active_count(), 0);

        let id = registry.register(peer()).await;
        assert_eq!(registry.active_count(), 1);
        assert!(registry.contains(id).await);

        registry.deregister(id).await;
        assert_eq!(registry.active_count(), 0);
        assert!(!registry.contains(id).await);
    }

    #[tokio::test]
    async fn test_deregister_twice_decrements_once() {
        let registry = SessionRegistry::new(1024);

        let a = registry.register(peer()).await;
        let b = registry.register(peer()).await;
        assert_eq!(registry.active_count(), 2);

        registry.deregister(a).await;
        registry.deregister(a).await;

        assert_eq!(registry.active_count(), 1);
        assert!(registry.contains(b).await);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = SessionRegistry::new(1024);

        let a = registry.register(peer()).await;
        let b = registry.register(peer()).await;
        let c = registry.register(peer()).await;

        assert!(a != b && b != c && a != c);
    }

    #[tokio::test]
    async fn test_count_tracks_many_sessions() {
        let registry = SessionRegistry::new(1024);

        let ids: Vec<SessionId> = {
            let mut ids = Vec::new();
            for _ in 0..10 {
                ids.push(registry.register(peer()).await);
            }
            ids
        };
        assert_eq!(registry.active_count(), 10);

        for id in ids {
            registry.deregister(id).await;
        }
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_frame_capacity_exposed() {
        let registry = SessionRegistry::new(192 * 320 * 3);
        assert_eq!(registry.frame_capacity(), 184_320);
    }
}
