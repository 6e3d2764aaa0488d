use http::Method;
use serde_json::{json, Value};

use super::{ensure_json, AdaptResult};

pub fn adapt(tail: &str, method: &Method, body: &[u8]) -> AdaptResult {
    let ltail = tail.trim_start_matches('/').to_lowercase();

    if *method == Method::GET {
        if ltail.is_empty() || ltail == "slot" {
            let payload = json!({
                "jsonrpc": "2.0", "id": 1, "method": "getSlot",
                "params": [{ "commitment": "finalized" }],
            });
            return AdaptResult {
                tail: String::new(),
                method: Method::POST,
                body: serde_json::to_vec(&payload).unwrap(),
                headers: ensure_json(Default::default()),
                allowed_host_substr: Vec::new(),
            };
        }
        if let Some(addr) = ltail.strip_prefix("balance/") {
            if !addr.is_empty() {
                let payload = json!({
                    "jsonrpc": "2.0", "id": 1, "method": "getBalance",
                    "params": [addr, { "commitment": "finalized" }],
                });
                return AdaptResult {
                    tail: String::new(),
                    method: Method::POST,
                    body: serde_json::to_vec(&payload).unwrap(),
                    headers: ensure_json(Default::default()),
                    allowed_host_substr: Vec::new(),
                };
            }
        }
        // Any other GET is passed through as-is; an upstream 405 is honest.
        return AdaptResult {
            tail: tail.to_string(),
            method: method.clone(),
            body: Vec::new(),
            headers: Default::default(),
            allowed_host_substr: Vec::new(),
        };
    }

    // POST: reasonable default plus commitment injection for bare getBalance.
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let method_name = parsed.as_ref().and_then(|v| v.get("method")).and_then(Value::as_str).unwrap_or("");

    if parsed.is_none() || method_name.is_empty() {
        let payload = json!({
            "jsonrpc": "2.0", "id": 1, "method": "getSlot",
            "params": [{ "commitment": "finalized" }],
        });
        return AdaptResult {
            tail: String::new(),
            method: Method::POST,
            body: serde_json::to_vec(&payload).unwrap(),
            headers: ensure_json(Default::default()),
            allowed_host_substr: Vec::new(),
        };
    }

    let mut value = parsed.unwrap();
    if method_name.eq_ignore_ascii_case("getBalance") {
        if let Some(params) = value.get_mut("params").and_then(Value::as_array_mut) {
            if params.len() == 1 {
                params.push(json!({ "commitment": "finalized" }));
            }
        }
    }

    AdaptResult {
        tail: tail.to_string(),
        method: method.clone(),
        body: serde_json::to_vec(&value).unwrap(),
        headers: ensure_json(Default::default()),
        allowed_host_substr: Vec::new(),
    }
}
