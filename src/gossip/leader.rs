//! Leader election (lexicographically smallest peer id) and heartbeat.
//! Detection-only: a follower observing a stale leader logs a warning and
//! takes no explicit failover action — the next leader emerges implicitly
//! once peer gossip evicts the former one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::peers::{Peer, PeerStore};
use crate::registry::now_unix;

#[derive(Debug, Serialize, Deserialize)]
pub struct Heartbeat {
    pub leader_id: String,
    pub timestamp: i64,
}

#[derive(Default)]
pub struct HeartbeatTable {
    last_seen: RwLock<HashMap<String, i64>>,
}

impl HeartbeatTable {
    pub fn new() -> Self {
        Self { last_seen: RwLock::new(HashMap::new()) }
    }

    pub async fn record(&self, id: &str, ts: i64) {
        self.last_seen.write().await.insert(id.to_string(), ts);
    }

    pub async fn is_alive(&self, id: &str, ttl: Duration) -> bool {
        match self.last_seen.read().await.get(id) {
            Some(ts) => now_unix() - ts < ttl.as_secs() as i64,
            None => false,
        }
    }
}

pub fn elect(peers: &[Peer]) -> Option<String> {
    peers.iter().map(|p| p.id.clone()).min()
}

pub async fn run_heartbeat_loop(
    store: Arc<PeerStore>,
    table: Arc<HeartbeatTable>,
    self_id: String,
    ttl: Duration,
) {
    let client = Client::new();
    loop {
        let plist = store.list().await;
        let leader_id = elect(&plist);

        if leader_id.as_deref() == Some(self_id.as_str()) {
            let hb = Heartbeat { leader_id: self_id.clone(), timestamp: now_unix() };
            for p in &plist {
                if p.id == self_id {
                    continue;
                }
                let url = format!("http://{}/heartbeat", p.addr);
                if let Err(e) = client.post(&url).json(&hb).send().await {
                    tracing::debug!(peer = %p.id, error = %e, "heartbeat send failed");
                }
            }
            table.record(&self_id, hb.timestamp).await;
        } else if let Some(leader_id) = &leader_id {
            if !table.is_alive(leader_id, ttl).await {
                tracing::warn!(old_leader = %leader_id, "leader is dead, awaiting peer-set eviction");
            }
        }

        tokio::time::sleep(ttl / 2).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elects_lexicographically_smallest_id() {
        let peers = vec![
            Peer { id: "zzz".into(), addr: "a".into(), failures: 0 },
            Peer { id: "aaa".into(), addr: "b".into(), failures: 0 },
        ];
        assert_eq!(elect(&peers), Some("aaa".to_string()));
    }

    #[test]
    fn elects_none_for_empty_peer_set() {
        assert_eq!(elect(&[]), None);
    }
}
