//! C7 — Cluster Gossip: HMAC-signed announce, peer-list exchange, and
//! network-state advertisement.

pub mod leader;

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;
use crate::peers::{Peer, PeerStore};
use crate::registry::{NetworkState, Registry};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnounceRequest {
    pub id: String,
    pub name: String,
    pub internal_addr: String,
    pub timestamp: i64,
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnounceResponse {
    pub peers: Vec<Peer>,
}

fn mac_for(secret: &str, id: &str, name: &str, internal_addr: &str, timestamp: i64) -> HmacSha256 {
    let payload = format!("{id}{name}{internal_addr}{timestamp}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(payload.as_bytes());
    mac
}

fn sign(secret: &str, id: &str, name: &str, internal_addr: &str, timestamp: i64) -> String {
    hex::encode(mac_for(secret, id, name, internal_addr, timestamp).finalize().into_bytes())
}

/// Constant-time signature verification via `hmac`'s own `verify_slice`.
fn verify(secret: &str, req: &AnnounceRequest) -> bool {
    let Ok(given) = hex::decode(&req.signature) else { return false };
    mac_for(secret, &req.id, &req.name, &req.internal_addr, req.timestamp)
        .verify_slice(&given)
        .is_ok()
}

/// Bootstraps against `server_url`, returning the responder's full peer list.
pub async fn announce(
    client: &Client,
    server_url: &str,
    id: &str,
    name: &str,
    internal_addr: &str,
    secret: &str,
) -> Result<Vec<Peer>, AppError> {
    let ts = crate::registry::now_unix();
    let signature = sign(secret, id, name, internal_addr, ts);
    let req = AnnounceRequest {
        id: id.to_string(),
        name: name.to_string(),
        internal_addr: internal_addr.to_string(),
        timestamp: ts,
        signature,
    };
    let resp = client
        .post(format!("{server_url}/announce"))
        .json(&req)
        .send()
        .await
        .map_err(|e| AppError::Config(format!("announce request failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(AppError::Config(format!("announce failed with status {}", resp.status())));
    }
    let body: AnnounceResponse = resp.json().await.map_err(|e| AppError::Config(e.to_string()))?;
    Ok(body.peers)
}

/// Handles an inbound `POST /announce`: verifies the HMAC, registers the
/// peer, and responds with the full peer list plus self.
pub async fn handle_announce(
    store: &PeerStore,
    self_id: &str,
    self_addr: &str,
    secret: &str,
    req: AnnounceRequest,
) -> Result<AnnounceResponse, AppError> {
    if !verify(secret, &req) {
        return Err(AppError::InvalidSignature);
    }
    store.add(Peer { id: req.id.clone(), addr: req.internal_addr.clone(), failures: 0 }).await;
    let mut all = store.list().await;
    all.push(Peer { id: self_id.to_string(), addr: self_addr.to_string(), failures: 0 });
    tracing::info!(peer_id = %req.id, addr = %req.internal_addr, "peer announced");
    Ok(AnnounceResponse { peers: all })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GossipMessage {
    pub from: String,
    pub peers: Vec<Peer>,
}

/// Every `interval`, pick a uniformly random peer (not self) and send the
/// full peer list. Two consecutive failures evict that peer.
pub async fn run_peer_gossip_loop(store: Arc<PeerStore>, self_id: String, interval: Duration) {
    let client = Client::new();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let plist = store.list().await;
        if plist.len() <= 1 {
            continue;
        }
        let Some(target) = plist.choose(&mut rand::thread_rng()).filter(|p| p.id != self_id) else { continue };

        let msg = GossipMessage { from: self_id.clone(), peers: plist.clone() };
        let url = format!("http://{}/gossip", target.addr);
        match client.post(&url).json(&msg).send().await {
            Ok(_) => store.record_success(&target.id).await,
            Err(e) => {
                tracing::warn!(target = %target.id, error = %e, "gossip send failed");
                store.record_failure(&target.id).await;
            }
        }
    }
}

pub async fn handle_gossip(store: &PeerStore, msg: GossipMessage) {
    for p in msg.peers {
        store.add(p).await;
    }
    tracing::debug!(from = %msg.from, "gossip received");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAdvert {
    pub url: String,
    pub priority: i32,
    pub protocol: String,
    pub alive: bool,
    pub ping: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAdvert {
    pub name: String,
    pub protocol: String,
    pub nodes: Vec<NodeAdvert>,
    pub ts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateMessage {
    pub from: String,
    pub networks: Vec<NetworkAdvert>,
}

fn build_advert(self_id: &str, states: &std::collections::HashMap<String, NetworkState>) -> StateMessage {
    let networks = states
        .iter()
        .map(|(name, st)| NetworkAdvert {
            name: name.clone(),
            protocol: st.protocol.as_str().to_string(),
            nodes: st
                .best
                .iter()
                .map(|n| NodeAdvert {
                    url: n.node.url.clone(),
                    priority: n.node.priority,
                    protocol: st.protocol.as_str().to_string(),
                    alive: n.alive,
                    ping: n.ping,
                })
                .collect(),
            ts: crate::registry::now_unix(),
        })
        .collect();
    StateMessage { from: self_id.to_string(), networks }
}

/// Every `interval`, send the current best set across all networks to a
/// uniformly random peer (replacing the source's `now_nanos mod n` pick —
/// see design notes).
pub async fn run_state_advertisement_loop(
    registry: Arc<Registry>,
    peer_store: Arc<PeerStore>,
    self_id: String,
    interval: Duration,
) {
    let client = Client::new();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let plist = peer_store.list().await;
        if plist.len() <= 1 {
            continue;
        }
        let Some(peer) = plist.choose(&mut rand::thread_rng()) else { continue };
        let states = registry.all().await;
        let msg = build_advert(&self_id, &states);
        let url = format!("http://{}/gossip-state", peer.addr);
        if let Err(e) = client.post(&url).json(&msg).send().await {
            tracing::debug!(peer = %peer.id, error = %e, "gossip_state_send_error");
        }
    }
}

/// Merges an inbound advertisement into each named network's discovered set.
pub async fn handle_state(registry: &Registry, msg: StateMessage, ttl: Duration) {
    for advert in &msg.networks {
        let urls: Vec<(String, i32)> = advert.nodes.iter().map(|n| (n.url.clone(), n.priority)).collect();
        registry.merge_discovered(&advert.name, urls, ttl).await;
    }
    tracing::debug!(from = %msg.from, networks = msg.networks.len(), "gossip_state_received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_expected_hmac() {
        let sig = sign("secret", "id1", "node1", "10.0.0.1:8080", 1700000000);
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn verify_rejects_wrong_signature() {
        let req = AnnounceRequest {
            id: "id1".into(),
            name: "node1".into(),
            internal_addr: "10.0.0.1:8080".into(),
            timestamp: 1700000000,
            signature: "deadbeef".into(),
        };
        assert!(!verify("secret", &req));
    }

    #[test]
    fn verify_accepts_correct_signature() {
        let sig = sign("secret", "id1", "node1", "10.0.0.1:8080", 1700000000);
        let req = AnnounceRequest {
            id: "id1".into(),
            name: "node1".into(),
            internal_addr: "10.0.0.1:8080".into(),
            timestamp: 1700000000,
            signature: sig,
        };
        assert!(verify("secret", &req));
    }
}
