//! Per-protocol probe routines. Each returns `(alive, ping_ms)`.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::{json, Value};

use crate::registry::Protocol;

pub fn default_timeout_for(protocol: Protocol) -> Duration {
    match protocol {
        Protocol::Sol => Duration::from_millis(800),
        Protocol::Evm => Duration::from_millis(1500),
        Protocol::Trx => Duration::from_millis(1500),
        Protocol::Btc | Protocol::Doge | Protocol::Ltc => Duration::from_millis(2000),
    }
}

/// A probe either came back with a liveness verdict (carrying the HTTP status
/// so the caller can classify a 4xx response as fatal), or failed in a way
/// that the caller must classify as fatal/transient at the transport level.
pub enum ProbeOutcome {
    Result { alive: bool, ping_ms: i64, status: u16 },
    Error(reqwest::Error),
}

fn non_empty_result(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("result").cloned())
        .map(|r| !r.is_null() && r != Value::String(String::new()))
        .unwrap_or(false)
}

pub async fn probe(client: &Client, protocol: Protocol, url: &str) -> ProbeOutcome {
    match protocol {
        Protocol::Evm => probe_evm(client, url).await,
        Protocol::Btc => probe_btc(client, url).await,
        Protocol::Trx => probe_trx(client, url).await,
        Protocol::Ltc => probe_ltc(client, url).await,
        Protocol::Doge => probe_doge(client, url).await,
        Protocol::Sol => probe_sol(client, url).await,
    }
}

async fn probe_evm(client: &Client, url: &str) -> ProbeOutcome {
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber", "params": [] });
    let start = Instant::now();
    match client.post(url).json(&body).send().await {
        Ok(resp) => finish_jsonrpc(resp, start).await,
        Err(e) => ProbeOutcome::Error(e),
    }
}

async fn probe_btc(client: &Client, url: &str) -> ProbeOutcome {
    let lower = url.to_lowercase();
    let start = Instant::now();
    if lower.contains("blockstream.info") || lower.ends_with("/api") {
        let target = format!("{}/blocks/tip/height", url.trim_end_matches('/'));
        return match client.get(&target).send().await {
            Ok(resp) => result_from_status(resp, start),
            Err(e) => ProbeOutcome::Error(e),
        };
    }
    if lower.contains("gateway.tatum.io") {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "getblockcount", "params": [] });
        return match client.post(url).json(&body).send().await {
            Ok(resp) => finish_jsonrpc(resp, start).await,
            Err(e) => ProbeOutcome::Error(e),
        };
    }
    ProbeOutcome::Result { alive: false, ping_ms: 0, status: 0 }
}

async fn probe_trx(client: &Client, url: &str) -> ProbeOutcome {
    let lower = url.to_lowercase();
    let start = Instant::now();
    if lower.contains("tatum.io") {
        let target = format!("{}/wallet/getnodeinfo", url.trim_end_matches('/'));
        return match client.get(&target).send().await {
            Ok(resp) => result_from_status(resp, start),
            Err(e) => ProbeOutcome::Error(e),
        };
    }
    let target = format!("{}/wallet/getnowblock", url.trim_end_matches('/'));
    match client.post(&target).json(&json!({})).send().await {
        Ok(resp) => result_from_status(resp, start),
        Err(e) => ProbeOutcome::Error(e),
    }
}

async fn probe_ltc(client: &Client, url: &str) -> ProbeOutcome {
    let lower = url.to_lowercase();
    let start = Instant::now();
    if lower.contains("tatum.io") {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "getblockcount", "params": [] });
        return match client.post(url).json(&body).send().await {
            Ok(resp) => finish_jsonrpc(resp, start).await,
            Err(e) => ProbeOutcome::Error(e),
        };
    }
    let target = format!("{}/rest/chaininfo.json", url.trim_end_matches('/'));
    match client.get(&target).send().await {
        Ok(resp) => result_from_status(resp, start),
        Err(e) => ProbeOutcome::Error(e),
    }
}

async fn probe_doge(client: &Client, url: &str) -> ProbeOutcome {
    let lower = url.to_lowercase();
    let start = Instant::now();
    let target = if lower.contains("tatum.io") {
        format!("{}/v3/dogecoin/address/balance/test", url.trim_end_matches('/'))
    } else {
        format!("{}/api/v1/block/count", url.trim_end_matches('/'))
    };
    match client.get(&target).send().await {
        Ok(resp) => result_from_status(resp, start),
        Err(e) => ProbeOutcome::Error(e),
    }
}

async fn probe_sol(client: &Client, url: &str) -> ProbeOutcome {
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "getSlot", "params": [] });
    let start = Instant::now();
    match client.post(url).json(&body).send().await {
        Ok(resp) => finish_jsonrpc(resp, start).await,
        Err(e) => ProbeOutcome::Error(e),
    }
}

async fn finish_jsonrpc(resp: reqwest::Response, start: Instant) -> ProbeOutcome {
    let status = resp.status();
    match resp.bytes().await {
        Ok(buf) => ProbeOutcome::Result {
            alive: status.is_success() && non_empty_result(&buf),
            ping_ms: elapsed_ms(start),
            status: status.as_u16(),
        },
        Err(e) => ProbeOutcome::Error(e),
    }
}

/// A plain liveness check with no response body to inspect: alive iff the
/// status is a 2xx, status always carried through for fatal-4xx classification.
fn result_from_status(resp: reqwest::Response, start: Instant) -> ProbeOutcome {
    let status = resp.status();
    ProbeOutcome::Result { alive: status.is_success(), ping_ms: elapsed_ms(start), status: status.as_u16() }
}

fn elapsed_ms(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_result_rejects_empty_string_and_null() {
        assert!(!non_empty_result(br#"{"result":""}"#));
        assert!(!non_empty_result(br#"{"result":null}"#));
        assert!(non_empty_result(br#"{"result":"0x10"}"#));
    }

    #[test]
    fn default_timeouts_match_protocol_table() {
        assert_eq!(default_timeout_for(Protocol::Sol), Duration::from_millis(800));
        assert_eq!(default_timeout_for(Protocol::Evm), Duration::from_millis(1500));
        assert_eq!(default_timeout_for(Protocol::Btc), Duration::from_millis(2000));
    }
}
