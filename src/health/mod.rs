//! C4 — Health Prober: periodic multi-protocol liveness checks with
//! per-provider concurrency gates and a fatal-error drop queue.

mod probes;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use reqwest::Client;
use tokio::sync::Semaphore;

use crate::metrics;
use crate::registry::{pick_fastest_per_priority, NodeWithPing, Protocol, Registry, Upstream};
pub use probes::default_timeout_for;

const PROVIDER_GATE_WIDTH: usize = 1;
const DEFAULT_GATE_WIDTH: usize = 5;
const PROVIDER_HOSTS: &[&str] = &["tatum.io", "alchemyapi.io"];

pub struct Checker {
    tor_socks5: String,
    registry: Arc<Registry>,
    client: Client,
    drop_queue: DashSet<(String, String)>,
    gates: HashMap<&'static str, Arc<Semaphore>>,
    default_gate: Arc<Semaphore>,
}

impl Checker {
    pub fn new(tor_socks5: impl Into<String>, registry: Arc<Registry>) -> Self {
        let tor_socks5 = {
            let s = tor_socks5.into();
            if s.is_empty() { "127.0.0.1:9050".to_string() } else { s }
        };
        Checker {
            tor_socks5,
            registry,
            client: Client::builder().pool_max_idle_per_host(100).build().expect("http client"),
            drop_queue: DashSet::new(),
            gates: PROVIDER_HOSTS
                .iter()
                .map(|h| (*h, Arc::new(Semaphore::new(PROVIDER_GATE_WIDTH))))
                .collect(),
            default_gate: Arc::new(Semaphore::new(DEFAULT_GATE_WIDTH)),
        }
    }

    fn gate_for(&self, first_url: Option<&str>) -> Arc<Semaphore> {
        if let Some(url) = first_url {
            for host in PROVIDER_HOSTS {
                if url.contains(host) {
                    return self.gates[host].clone();
                }
            }
        }
        self.default_gate.clone()
    }

    fn client_for(&self, tor: bool) -> Client {
        if !tor {
            return self.client.clone();
        }
        Client::builder()
            .proxy(reqwest::Proxy::all(format!("socks5h://{}", self.tor_socks5)).expect("valid tor proxy"))
            .build()
            .unwrap_or_else(|_| self.client.clone())
    }

    async fn per_node_timeout(&self, network: &str, protocol: Protocol) -> Duration {
        let declared = self.registry.timeout_ms(network).await;
        if declared > 0 {
            Duration::from_millis(declared)
        } else {
            default_timeout_for(protocol)
        }
    }

    /// Probes one upstream, applying its timeout as both connect and overall
    /// deadline. Classifies the outcome for the fatal-drop queue.
    async fn probe_one(&self, network: &str, protocol: Protocol, node: &Upstream, timeout: Duration) -> NodeWithPing {
        let client = self.client_for(node.tor);
        let fut = probes::probe(&client, protocol, &node.url);
        let outcome = tokio::time::timeout(timeout, fut).await;

        match outcome {
            Ok(probes::ProbeOutcome::Result { alive, ping_ms, status }) => {
                if !alive && is_fatal_status(status) {
                    self.drop_queue.insert((network.to_string(), node.url.clone()));
                }
                NodeWithPing { node: node.clone(), alive, ping: ping_ms }
            }
            Ok(probes::ProbeOutcome::Error(e)) => {
                if is_fatal(&e) {
                    self.drop_queue.insert((network.to_string(), node.url.clone()));
                }
                NodeWithPing { node: node.clone(), alive: false, ping: 0 }
            }
            Err(_elapsed) => NodeWithPing { node: node.clone(), alive: false, ping: 0 },
        }
    }

    /// Probes every declared upstream for one network and returns the new
    /// best set (§4.1 selection already applied).
    pub async fn update_network(&self, network: &str, protocol: Protocol, declared: &[Upstream]) -> Vec<NodeWithPing> {
        let timeout = self.per_node_timeout(network, protocol).await;
        let mut futures = Vec::with_capacity(declared.len());
        for node in declared {
            futures.push(self.probe_one(network, protocol, node, timeout));
        }
        let outcomes = futures_util::future::join_all(futures).await;
        pick_fastest_per_priority(&outcomes)
    }

    /// Drains the fatal-drop queue, removing dropped URLs from each
    /// network's declared set.
    async fn drain_drop_queue(&self) {
        let drops: Vec<(String, String)> = self.drop_queue.iter().map(|e| e.clone()).collect();
        self.drop_queue.clear();
        for (network, url) in drops {
            self.registry.delete_node(&network, &url).await;
            tracing::warn!(network = %network, url = %url, "fatal probe failure, dropped from declared set");
        }
    }

    /// Runs one full health cycle: prune-and-merge, gated concurrent probing
    /// per network, best-set install, gauge export, drop-queue drain.
    pub async fn run_cycle(&self, ttl: Duration) {
        self.registry.prune_and_merge(ttl).await;

        let all = self.registry.all().await;
        let mut handles = Vec::with_capacity(all.len());
        for (name, state) in all {
            let gate = self.gate_for(state.declared.first().map(|n| n.url.as_str()));
            handles.push(self.run_one_network(name, state.protocol, state.declared, gate));
        }
        futures_util::future::join_all(handles).await;

        self.drain_drop_queue().await;
    }

    async fn run_one_network(&self, name: String, protocol: Protocol, declared: Vec<Upstream>, gate: Arc<Semaphore>) {
        let _permit = gate.acquire().await.expect("semaphore open");
        let best = self.update_network(&name, protocol, &declared).await;
        metrics::set_nodes_total(&name, declared.len() as f64);
        metrics::set_nodes_healthy(&name, best.len() as f64);
        self.registry.set_best(&name, best).await;
        tracing::info!(network = %name, "health_update");
    }

    pub async fn run_loop(self: Arc<Self>, cycle: Duration, ttl: Duration) {
        let mut ticker = tokio::time::interval(cycle);
        loop {
            ticker.tick().await;
            self.run_cycle(ttl).await;
        }
    }
}

/// Fatal: DNS failure, connection refused, unsupported scheme, TLS/cert
/// error — anything that means retrying the same URL is pointless.
fn is_fatal(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_builder() {
        return true;
    }
    let msg = err.to_string().to_lowercase();
    msg.contains("dns") || msg.contains("no such host") || msg.contains("certificate") || msg.contains("tls")
}

/// A 4xx other than 429 means the upstream itself is rejecting us (bad path,
/// revoked key, gone) — retrying the same URL next cycle is pointless.
fn is_fatal_status(status: u16) -> bool {
    (400..500).contains(&status) && status != 429
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_gate_picked_by_first_declared_url() {
        let reg = Arc::new(Registry::new());
        let checker = Checker::new("", reg);
        let gate = checker.gate_for(Some("https://api.tatum.io/v3"));
        assert_eq!(gate.available_permits(), PROVIDER_GATE_WIDTH);
        let gate = checker.gate_for(Some("https://example.com"));
        assert_eq!(gate.available_permits(), DEFAULT_GATE_WIDTH);
    }

    #[test]
    fn fatal_status_excludes_429_and_non_4xx() {
        assert!(is_fatal_status(401));
        assert!(is_fatal_status(404));
        assert!(!is_fatal_status(429));
        assert!(!is_fatal_status(500));
        assert!(!is_fatal_status(200));
    }
}
