//! C3 — Registry: per-network state and best-upstream selection.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::NetworkConfig;
use crate::secrets;

/// Closed enumeration of supported RPC dialects. Dispatch on this by `match`,
/// never by string-contains — string-contains is reserved for provider-host
/// heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Evm,
    Btc,
    Trx,
    Ltc,
    Doge,
    Sol,
}

impl Protocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "evm" | "eth" | "bsc" | "polygon" | "fantom" => Some(Protocol::Evm),
            "btc" => Some(Protocol::Btc),
            "trx" => Some(Protocol::Trx),
            "ltc" => Some(Protocol::Ltc),
            "doge" => Some(Protocol::Doge),
            "sol" => Some(Protocol::Sol),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Evm => "evm",
            Protocol::Btc => "btc",
            Protocol::Trx => "trx",
            Protocol::Ltc => "ltc",
            Protocol::Doge => "doge",
            Protocol::Sol => "sol",
        }
    }
}

/// A single RPC endpoint available to serve a network. Identity is its URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upstream {
    pub url: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, rename = "isPrivate")]
    pub is_private: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub tor: bool,
}

fn default_priority() -> i32 {
    1
}

impl From<crate::config::NodeConfig> for Upstream {
    fn from(n: crate::config::NodeConfig) -> Self {
        Upstream {
            url: n.url,
            priority: if n.priority == 0 { 1 } else { n.priority },
            is_private: n.is_private,
            headers: n.headers,
            tor: n.tor,
        }
    }
}

/// A probe outcome: an upstream annotated with liveness and measured ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeWithPing {
    #[serde(flatten)]
    pub node: Upstream,
    pub alive: bool,
    pub ping: i64,
}

/// An upstream learned from a peer via gossip, TTL-bounded.
#[derive(Debug, Clone)]
pub struct DiscoveredNode {
    pub node: Upstream,
    pub expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct NetworkState {
    pub protocol: Protocol,
    pub route: String,
    pub timeout_ms: u64,
    pub declared: Vec<Upstream>,
    pub best: Vec<NodeWithPing>,
    pub discovered: Vec<DiscoveredNode>,
}

pub const MAX_DISCOVERED: usize = 20;

/// Per-network state, guarded by a readers-writer lock. See spec invariants:
/// best is ordered ascending by priority, unique per priority, and drawn only
/// from declared ∪ discovered.
#[derive(Default)]
pub struct Registry {
    state: RwLock<HashMap<String, NetworkState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { state: RwLock::new(HashMap::new()) }
    }

    pub async fn init_from_configs(&self, cfgs: HashMap<String, NetworkConfig>) {
        let mut guard = self.state.write().await;
        for (name, cfg) in cfgs {
            let Some(protocol) = Protocol::parse(&cfg.protocol) else {
                tracing::error!(network = %name, protocol = %cfg.protocol, "unknown protocol, skipping");
                continue;
            };
            guard.insert(
                name,
                NetworkState {
                    protocol,
                    route: cfg.route,
                    timeout_ms: cfg.timeout_ms,
                    declared: cfg.nodes.into_iter().map(Upstream::from).collect(),
                    best: Vec::new(),
                    discovered: Vec::new(),
                },
            );
        }
    }

    pub async fn best(&self, name: &str) -> Vec<NodeWithPing> {
        self.state.read().await.get(name).map(|s| s.best.clone()).unwrap_or_default()
    }

    pub async fn set_best(&self, name: &str, best: Vec<NodeWithPing>) {
        if let Some(s) = self.state.write().await.get_mut(name) {
            s.best = best;
        }
    }

    pub async fn append_best(&self, name: &str, node: NodeWithPing) {
        if let Some(s) = self.state.write().await.get_mut(name) {
            s.best.push(node);
        }
    }

    /// Snapshot of every network's state. Callers must not mutate returned
    /// clones and expect them to propagate back.
    pub async fn all(&self) -> HashMap<String, NetworkState> {
        self.state.read().await.clone()
    }

    pub async fn add_network(&self, cfg: NetworkConfig, best: Vec<NodeWithPing>) {
        let Some(protocol) = Protocol::parse(&cfg.protocol) else { return };
        let key = cfg.route.trim_matches('/').to_lowercase();
        let mut guard = self.state.write().await;
        guard.insert(
            key,
            NetworkState {
                protocol,
                route: cfg.route,
                timeout_ms: cfg.timeout_ms,
                declared: cfg.nodes.into_iter().map(Upstream::from).collect(),
                best,
                discovered: Vec::new(),
            },
        );
    }

    pub async fn protocol_of(&self, name: &str) -> Option<Protocol> {
        self.state.read().await.get(name).map(|s| s.protocol)
    }

    pub async fn add_node(&self, network: &str, node: Upstream) {
        if let Some(s) = self.state.write().await.get_mut(network) {
            s.declared.push(node);
        }
    }

    /// Removes `url` from both declared and best for `network`, atomically.
    pub async fn delete_node(&self, network: &str, url: &str) {
        if let Some(s) = self.state.write().await.get_mut(network) {
            s.declared.retain(|n| n.url != url);
            s.best.retain(|n| n.node.url != url);
        }
    }

    /// Drops expired discovered entries, then merges surviving ones into
    /// declared for URLs not already present.
    pub async fn prune_and_merge(&self, ttl: Duration) {
        let now = Instant::now();
        let _ = ttl;
        let mut guard = self.state.write().await;
        for state in guard.values_mut() {
            state.discovered.retain(|d| d.expires_at > now);
            let known: std::collections::HashSet<String> =
                state.declared.iter().map(|n| n.url.clone()).collect();
            for d in &state.discovered {
                if !known.contains(&d.node.url) {
                    state.declared.push(d.node.clone());
                }
            }
        }
    }

    pub async fn exists(&self, route: &str) -> bool {
        let key = route.trim_matches('/').to_lowercase();
        self.state.read().await.contains_key(&key)
    }

    pub async fn timeout_ms(&self, network: &str) -> u64 {
        self.state.read().await.get(network).map(|s| s.timeout_ms).unwrap_or(0)
    }

    /// Merges gossip-discovered URLs into `network`'s discovered set, subject
    /// to [`MAX_DISCOVERED`] and `ttl`. Only URLs not already declared are
    /// considered; discovered entries never carry headers.
    pub async fn merge_discovered(&self, network: &str, urls: Vec<(String, i32)>, ttl: Duration) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.get_mut(network) else { return };
        let known: std::collections::HashSet<String> =
            state.declared.iter().map(|n| n.url.clone()).collect();
        let expires_at = Instant::now() + ttl;
        for (url, priority) in urls {
            if known.contains(&url) {
                continue;
            }
            if state.discovered.iter().any(|d| d.node.url == url) {
                continue;
            }
            if state.discovered.len() >= MAX_DISCOVERED {
                continue;
            }
            state.discovered.push(DiscoveredNode {
                node: Upstream { url, priority, is_private: false, headers: HashMap::new(), tor: false },
                expires_at,
            });
        }
    }
}

/// Fastest-per-priority selection (pure, lock-free): group live entries by
/// priority bucket, keep the minimum-ping entry per bucket, sort ascending by
/// priority. Idempotent — applying it twice yields the same sequence.
pub fn pick_fastest_per_priority(nodes: &[NodeWithPing]) -> Vec<NodeWithPing> {
    let mut buckets: HashMap<i32, NodeWithPing> = HashMap::new();
    let mut order: Vec<i32> = Vec::new();
    for n in nodes {
        if !n.alive {
            continue;
        }
        match buckets.get(&n.node.priority) {
            Some(cur) if cur.ping <= n.ping => {}
            Some(_) => {
                buckets.insert(n.node.priority, n.clone());
            }
            None => {
                order.push(n.node.priority);
                buckets.insert(n.node.priority, n.clone());
            }
        }
    }
    let mut best: Vec<NodeWithPing> = order.into_iter().map(|p| buckets.remove(&p).unwrap()).collect();
    best.sort_by_key(|n| n.node.priority);
    best
}

/// Strips secrets from headers for external listings (e.g. `/active-nodes`).
pub fn sanitize(nodes: &[NodeWithPing]) -> Vec<NodeWithPing> {
    nodes
        .iter()
        .map(|n| {
            let mut clean = n.clone();
            clean.node.headers = secrets::redact_headers(&n.node.headers);
            clean
        })
        .collect()
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(priority: i32, alive: bool, ping: i64) -> NodeWithPing {
        NodeWithPing {
            node: Upstream { url: format!("u-{priority}-{ping}"), priority, is_private: false, headers: HashMap::new(), tor: false },
            alive,
            ping,
        }
    }

    #[test]
    fn fastest_per_priority_groups_and_sorts() {
        let a = node(1, true, 30);
        let b = node(1, true, 10);
        let c = node(2, true, 5);
        let d = node(2, false, 1);
        let best = pick_fastest_per_priority(&[a, b.clone(), c.clone(), d]);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].node.url, b.node.url);
        assert_eq!(best[1].node.url, c.node.url);
    }

    #[test]
    fn fastest_per_priority_is_idempotent() {
        let nodes = vec![node(1, true, 30), node(1, true, 10), node(2, true, 5)];
        let once = pick_fastest_per_priority(&nodes);
        let twice = pick_fastest_per_priority(&once);
        assert_eq!(once.iter().map(|n| n.node.url.clone()).collect::<Vec<_>>(),
                   twice.iter().map(|n| n.node.url.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn dead_entries_excluded() {
        let best = pick_fastest_per_priority(&[node(1, false, 1)]);
        assert!(best.is_empty());
    }

    #[tokio::test]
    async fn prune_and_merge_drops_expired_and_merges_fresh() {
        let reg = Registry::new();
        reg.init_from_configs(HashMap::from([(
            "eth".to_string(),
            NetworkConfig { route: "/eth".into(), protocol: "evm".into(), timeout_ms: 0, nodes: vec![] },
        )]))
        .await;
        reg.merge_discovered("eth", vec![("https://fresh".to_string(), 1)], Duration::from_secs(600)).await;
        reg.merge_discovered("eth", vec![("https://stale".to_string(), 1)], Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        reg.prune_and_merge(Duration::from_secs(600)).await;
        let all = reg.all().await;
        let declared: Vec<_> = all["eth"].declared.iter().map(|n| n.url.clone()).collect();
        assert!(declared.contains(&"https://fresh".to_string()));
        assert!(!declared.contains(&"https://stale".to_string()));
    }
}
