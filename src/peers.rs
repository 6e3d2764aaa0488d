//! C2 — Peer Store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const MAX_CONSECUTIVE_FAILURES: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: String,
    pub addr: String,
    #[serde(skip)]
    pub failures: u32,
}

#[derive(Default)]
pub struct PeerStore {
    peers: RwLock<HashMap<String, Peer>>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self { peers: RwLock::new(HashMap::new()) }
    }

    pub async fn add(&self, peer: Peer) {
        let mut guard = self.peers.write().await;
        guard.insert(peer.id.clone(), peer);
    }

    pub async fn remove(&self, id: &str) {
        self.peers.write().await.remove(id);
    }

    pub async fn list(&self) -> Vec<Peer> {
        self.peers.read().await.values().cloned().collect()
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.peers.read().await.contains_key(id)
    }

    /// Records a successful gossip round-trip with `id`, resetting its failure counter.
    pub async fn record_success(&self, id: &str) {
        if let Some(p) = self.peers.write().await.get_mut(id) {
            p.failures = 0;
        }
    }

    /// Records a failed gossip round-trip with `id`; evicts the peer once it
    /// reaches [`MAX_CONSECUTIVE_FAILURES`].
    pub async fn record_failure(&self, id: &str) {
        let mut guard = self.peers.write().await;
        let evict = if let Some(p) = guard.get_mut(id) {
            p.failures += 1;
            p.failures >= MAX_CONSECUTIVE_FAILURES
        } else {
            false
        };
        if evict {
            guard.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evicts_after_two_consecutive_failures() {
        let store = PeerStore::new();
        store.add(Peer { id: "a".into(), addr: "h:1".into(), failures: 0 }).await;
        store.record_failure("a").await;
        assert!(store.exists("a").await);
        store.record_failure("a").await;
        assert!(!store.exists("a").await);
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let store = PeerStore::new();
        store.add(Peer { id: "a".into(), addr: "h:1".into(), failures: 0 }).await;
        store.record_failure("a").await;
        store.record_success("a").await;
        store.record_failure("a").await;
        assert!(store.exists("a").await);
    }
}
