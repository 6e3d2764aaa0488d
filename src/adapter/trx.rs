use http::Method;

use super::{ensure_json, AdaptResult};

/// `/wallet/*`, `/walletsolidity/*`, `/v1/*` pass through; `/balance/{addr}`
/// is rewritten to TronGrid's account endpoint; everything else passes
/// through with a JSON content-type.
pub fn adapt(tail: &str, method: &Method, body: &[u8]) -> AdaptResult {
    let ltail = tail.trim_start_matches('/').to_lowercase();

    if let Some(addr) = ltail.strip_prefix("balance/") {
        if !addr.is_empty() {
            return AdaptResult {
                tail: format!("v1/accounts/{addr}"),
                method: Method::GET,
                body: Vec::new(),
                headers: ensure_json(Default::default()),
                allowed_host_substr: vec!["trongrid.io".to_string()],
            };
        }
    }

    if ltail.starts_with("wallet/") || ltail.starts_with("walletsolidity/") || ltail.starts_with("v1/") {
        return AdaptResult {
            tail: tail.to_string(),
            method: method.clone(),
            body: body.to_vec(),
            headers: ensure_json(Default::default()),
            allowed_host_substr: Vec::new(),
        };
    }

    AdaptResult {
        tail: tail.to_string(),
        method: method.clone(),
        body: body.to_vec(),
        headers: ensure_json(Default::default()),
        allowed_host_substr: Vec::new(),
    }
}
