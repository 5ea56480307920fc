//! Live set of connected sessions.
//!
//! Keyed by a server-assigned session id rather than display name: names
//! are never checked for uniqueness at handshake time, so duplicates must
//! be able to coexist. Name matching is a routing concern.

use castrel_core::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Unique id for one connection, assigned at registration.
pub type SessionId = u64;

/// A routable handle to one active session.
///
/// Cloning is cheap; the outbox sender is the only delivery path into the
/// session, so a handle stays usable across a snapshot even if the session
/// is removed mid-dispatch (the send then fails and is skipped).
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub id: SessionId,
    pub name: String,
    pub outbox: mpsc::Sender<Envelope>,
}

/// Registry of active sessions.
///
/// Insert, remove, and snapshot are serialized through one lock so a
/// routing decision never observes half-updated membership.
pub struct Registry {
    peers: RwLock<HashMap<SessionId, PeerHandle>>,
    next_id: AtomicU64,
    max_clients: usize,
}

impl Registry {
    /// Create an empty registry bounded at `max_clients` sessions.
    pub fn new(max_clients: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_clients,
        }
    }

    /// Allocate the next session id.
    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a session. Returns `false` when the registry is at capacity.
    pub async fn insert(&self, handle: PeerHandle) -> bool {
        let mut peers = self.peers.write().await;
        if peers.len() >= self.max_clients {
            return false;
        }
        info!(id = handle.id, name = %handle.name, "session registered");
        peers.insert(handle.id, handle);
        true
    }

    /// Remove a session. Removing an unknown id is a no-op, so the
    /// session's own closure can race an external removal safely.
    pub async fn remove(&self, id: SessionId) {
        let mut peers = self.peers.write().await;
        if let Some(handle) = peers.remove(&id) {
            debug!(id, name = %handle.name, "session removed");
        }
    }

    /// Consistent view of all active sessions for one routing decision.
    pub async fn snapshot(&self) -> Vec<PeerHandle> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(registry: &Registry, name: &str) -> PeerHandle {
        let (outbox, _rx) = mpsc::channel(1);
        PeerHandle {
            id: registry.next_id(),
            name: name.to_string(),
            outbox,
        }
    }

    #[tokio::test]
    async fn insert_snapshot_remove() {
        let registry = Registry::new(8);
        let alice = handle(&registry, "alice");
        let alice_id = alice.id;
        assert!(registry.insert(alice).await);
        assert!(registry.insert(handle(&registry, "bob")).await);

        let names: Vec<String> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"alice".to_string()));

        registry.remove(alice_id).await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_noop() {
        let registry = Registry::new(8);
        registry.remove(999).await;
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn duplicate_names_coexist() {
        let registry = Registry::new(8);
        assert!(registry.insert(handle(&registry, "bob")).await);
        assert!(registry.insert(handle(&registry, "bob")).await);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn rejects_insert_at_capacity() {
        let registry = Registry::new(1);
        assert!(registry.insert(handle(&registry, "alice")).await);
        assert!(!registry.insert(handle(&registry, "bob")).await);
        assert_eq!(registry.len().await, 1);
    }
}
