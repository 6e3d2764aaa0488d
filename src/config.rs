//! Process configuration and per-network descriptor loading.
//!
//! Env parsing follows the `env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)`
//! idiom used throughout this codebase's other services.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub pod_ip: String,
    pub pod_name: String,
    pub shared_secret: String,
    pub bootstrap_url: Option<String>,
    pub tor_socks5: String,
    pub admin_key: String,
    pub host: String,
    pub port: u16,
    pub networks_dir: String,
    pub gossip_peer_interval_secs: u64,
    pub gossip_state_interval_secs: u64,
    pub health_cycle_secs: u64,
    pub discovered_ttl_secs: u64,
    pub leader_heartbeat_ttl_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Config {
            pod_ip: env_or("POD_IP", "127.0.0.1"),
            pod_name: env_or("POD_NAME", "dev-node"),
            shared_secret: env_or("SHARED_SECRET", "devsecret"),
            bootstrap_url: std::env::var("BOOTSTRAP_URL").ok().filter(|s| !s.is_empty()),
            tor_socks5: env_or("TOR_SOCKS5", "127.0.0.1:9050"),
            admin_key: env_or("ADMIN_API_KEY", "changeme"),
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: parse_env("SERVER_PORT", 8080),
            networks_dir: env_or("NETWORKS_DIR", "config/networks"),
            gossip_peer_interval_secs: parse_env("GOSSIP_PEER_INTERVAL_SECS", 10),
            gossip_state_interval_secs: parse_env("GOSSIP_STATE_INTERVAL_SECS", 30),
            health_cycle_secs: parse_env("HEALTH_CYCLE_SECS", 30),
            discovered_ttl_secs: parse_env("DISCOVERED_TTL_SECS", 600),
            leader_heartbeat_ttl_secs: parse_env("LEADER_HEARTBEAT_TTL_SECS", 30),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub url: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, rename = "isPrivate")]
    pub is_private: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub tor: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub route: String,
    pub protocol: String,
    pub nodes: Vec<NodeConfig>,
    #[serde(default, rename = "timeoutMs")]
    pub timeout_ms: u64,
}

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\$\{([A-Z0-9_]+)\}").unwrap();
}

/// Expands `${NAME}` placeholders against the process environment, logging
/// (not failing) when a referenced variable is unset.
fn expand_placeholders(raw: &str, source: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(raw, |caps: &regex::Captures| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_else(|_| {
                tracing::error!(file = source, placeholder = name, "unresolved config placeholder");
                String::new()
            })
        })
        .into_owned()
}

/// Loads every `*.yaml` file in `dir` as a [`NetworkConfig`], keyed by file stem.
pub fn load_network_configs(dir: &str) -> Result<HashMap<String, NetworkConfig>, AppError> {
    let mut out = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir, error = %e, "networks dir unreadable, starting with no declared networks");
            return Ok(out);
        }
    };

    for entry in entries {
        let entry = entry.map_err(|e| AppError::Config(e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let key = file_stem(&path)?;
        let raw = std::fs::read_to_string(&path).map_err(|e| AppError::Config(e.to_string()))?;
        let expanded = expand_placeholders(&raw, &key);
        let mut cfg: NetworkConfig = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("{key}: {e}")))?;

        if cfg.route.is_empty() || cfg.protocol.is_empty() || cfg.nodes.is_empty() {
            return Err(AppError::Config(format!("{key}: invalid network config")));
        }
        for node in &mut cfg.nodes {
            if node.priority == 0 {
                node.priority = 1;
            }
        }
        out.insert(key, cfg);
    }
    Ok(out)
}

fn file_stem(path: &Path) -> Result<String, AppError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Config(format!("bad file name: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_placeholder() {
        std::env::set_var("RPCF_TEST_PLACEHOLDER", "shhh");
        let out = expand_placeholders("key: ${RPCF_TEST_PLACEHOLDER}", "test");
        assert_eq!(out, "key: shhh");
    }

    #[test]
    fn unresolved_placeholder_becomes_empty_not_fatal() {
        std::env::remove_var("RPCF_TEST_MISSING_XYZ");
        let out = expand_placeholders("key: ${RPCF_TEST_MISSING_XYZ}", "test");
        assert_eq!(out, "key: ");
    }
}
