//! C5 — Request Adapter: rewrites client-facing request shapes into
//! upstream-specific payloads, per network.

mod btc;
mod doge;
mod evm;
mod ltc;
mod nft;
mod sol;
mod trx;

use std::collections::HashMap;

use crate::registry::Protocol;

/// Output of adapting one client request: the rewritten tail, method, body,
/// header overrides, and an optional host-substring allowlist.
#[derive(Debug, Clone, Default)]
pub struct AdaptResult {
    pub tail: String,
    pub method: http::Method,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub allowed_host_substr: Vec<String>,
}

impl AdaptResult {
    fn pass_through(tail: &str, method: &http::Method, body: &[u8]) -> Self {
        AdaptResult {
            tail: tail.to_string(),
            method: method.clone(),
            body: body.to_vec(),
            headers: HashMap::new(),
            allowed_host_substr: Vec::new(),
        }
    }
}

pub fn ensure_json(mut headers: HashMap<String, String>) -> HashMap<String, String> {
    headers.entry("Content-Type".to_string()).or_insert_with(|| "application/json".to_string());
    headers
}

/// Prefixes a hex string with `0x` if it doesn't already carry one.
pub fn normalize_hex(s: &str) -> String {
    if s.starts_with("0x") || s.starts_with("0X") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

/// Dispatches by network name first (for convenience-shortcut networks),
/// falling back to protocol for plain pass-through.
pub fn adapt(
    network: &str,
    protocol: Protocol,
    base_url: &str,
    tail: &str,
    method: &http::Method,
    body: &[u8],
) -> AdaptResult {
    match network.to_lowercase().as_str() {
        "trx" => trx::adapt(tail, method, body),
        "btc" => btc::adapt(tail, method, body),
        "nft" => nft::adapt(tail, method, body),
        "sol" => sol::adapt(tail, method, body),
        "doge" => doge::adapt(tail, method, body),
        "ltc" => ltc::adapt(tail, method, body, base_url),
        _ => match protocol {
            Protocol::Evm => evm::adapt(tail, method, body),
            _ => AdaptResult::pass_through(tail, method, body),
        },
    }
}
