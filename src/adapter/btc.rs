use http::Method;

use super::AdaptResult;

/// Conservative adapter: pass explicit REST paths through; add two safe
/// shortcuts (`fees`, `balance/{addr}`) pinned to Tatum; otherwise fall back
/// to default pass-through behavior.
pub fn adapt(tail: &str, method: &Method, body: &[u8]) -> AdaptResult {
    let ltail = tail.trim_start_matches('/').to_lowercase();

    if ltail.is_empty() {
        return AdaptResult {
            tail: "blocks/tip/height".to_string(),
            method: Method::GET,
            body: Vec::new(),
            headers: Default::default(),
            allowed_host_substr: vec!["blockstream.info".to_string(), "tatum.io".to_string()],
        };
    }

    if ltail.starts_with("rest/")
        || ltail.starts_with("blocks/")
        || ltail.starts_with("tx/")
        || ltail.starts_with("address/")
    {
        return AdaptResult {
            tail: tail.to_string(),
            method: method.clone(),
            body: body.to_vec(),
            headers: Default::default(),
            allowed_host_substr: vec!["blockstream.info".to_string(), "tatum.io".to_string()],
        };
    }

    if ltail == "fees" {
        return AdaptResult {
            tail: "v3/blockchain/fee/BTC".to_string(),
            method: Method::GET,
            body: Vec::new(),
            headers: Default::default(),
            allowed_host_substr: vec!["tatum.io".to_string()],
        };
    }

    if let Some(addr) = ltail.strip_prefix("balance/") {
        if !addr.is_empty() {
            return AdaptResult {
                tail: format!("v3/bitcoin/address/balance/{addr}"),
                method: Method::GET,
                body: Vec::new(),
                headers: Default::default(),
                allowed_host_substr: vec!["tatum.io".to_string()],
            };
        }
    }

    AdaptResult::pass_through(tail, method, body)
}
