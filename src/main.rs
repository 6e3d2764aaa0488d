mod adapter;
mod admin;
mod config;
mod error;
mod gossip;
mod health;
mod metrics;
mod peers;
mod proxy;
mod public;
mod registry;
mod routes;
mod secrets;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::Config;
use crate::gossip::leader::{self, HeartbeatTable};
use crate::health::Checker;
use crate::peers::PeerStore;
use crate::proxy::Dispatcher;
use crate::registry::Registry;
use crate::routes::{build_router, GossipState, RouterDeps};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cfg = Config::load();
    tracing::info!(pod = %cfg.pod_name, addr = %cfg.pod_ip, "starting rpc-forwarder");

    let registry = Arc::new(Registry::new());
    match config::load_network_configs(&cfg.networks_dir) {
        Ok(networks) => registry.init_from_configs(networks).await,
        Err(e) => tracing::error!(error = %e, "failed to load network configs"),
    }

    let checker = Arc::new(Checker::new(cfg.tor_socks5.clone(), registry.clone()));
    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
    let peers = Arc::new(PeerStore::new());

    let self_id = uuid::Uuid::new_v4().to_string();
    let self_addr = format!("{}:{}", cfg.pod_ip, cfg.port);
    peers.add(crate::peers::Peer { id: self_id.clone(), addr: self_addr.clone(), failures: 0 }).await;

    if let Some(bootstrap_url) = &cfg.bootstrap_url {
        let client = Client::new();
        match gossip::announce(&client, bootstrap_url, &self_id, &cfg.pod_name, &self_addr, &cfg.shared_secret).await {
            Ok(discovered) => {
                for p in discovered {
                    if p.id != self_id {
                        peers.add(p).await;
                    }
                }
                tracing::info!(peers = peers.list().await.len(), "bootstrap announce succeeded");
            }
            Err(e) => tracing::warn!(error = %e, "bootstrap announce failed"),
        }
    }

    let health_cycle = Duration::from_secs(cfg.health_cycle_secs);
    let discovered_ttl = Duration::from_secs(cfg.discovered_ttl_secs);
    let gossip_peer_interval = Duration::from_secs(cfg.gossip_peer_interval_secs);
    let gossip_state_interval = Duration::from_secs(cfg.gossip_state_interval_secs);
    let leader_ttl = Duration::from_secs(cfg.leader_heartbeat_ttl_secs);

    tokio::spawn(checker.clone().run_loop(health_cycle, discovered_ttl));
    tokio::spawn(gossip::run_peer_gossip_loop(peers.clone(), self_id.clone(), gossip_peer_interval));
    tokio::spawn(gossip::run_state_advertisement_loop(
        registry.clone(),
        peers.clone(),
        self_id.clone(),
        gossip_state_interval,
    ));
    tokio::spawn(leader::run_heartbeat_loop(
        peers.clone(),
        Arc::new(HeartbeatTable::new()),
        self_id.clone(),
        leader_ttl,
    ));

    let gossip_state = Arc::new(GossipState {
        peers: peers.clone(),
        registry: registry.clone(),
        self_id: self_id.clone(),
        self_addr: self_addr.clone(),
        shared_secret: cfg.shared_secret.clone(),
        discovered_ttl,
    });

    let router = build_router(RouterDeps {
        registry: registry.clone(),
        checker: checker.clone(),
        dispatcher: dispatcher.clone(),
        gossip_state,
        admin_key: cfg.admin_key.clone(),
        tor_socks5: cfg.tor_socks5.clone(),
    });

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("bind listener");
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await.expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("ctrl_c handler");
    tracing::info!("shutdown signal received");
}
