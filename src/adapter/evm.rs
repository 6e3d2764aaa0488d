use http::Method;
use serde_json::json;

use super::{ensure_json, normalize_hex, AdaptResult};

pub fn adapt(tail: &str, method: &Method, body: &[u8]) -> AdaptResult {
    let ltail = tail.trim_start_matches('/').to_lowercase();

    if *method == Method::GET {
        let rpc = |m: &str| {
            serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": m, "params": [] })).unwrap()
        };

        match ltail.as_str() {
            "blocknumber" | "block_number" => {
                return AdaptResult {
                    tail: String::new(),
                    method: Method::POST,
                    body: rpc("eth_blockNumber"),
                    headers: ensure_json(Default::default()),
                    allowed_host_substr: Vec::new(),
                };
            }
            "gasprice" | "gas_price" => {
                return AdaptResult {
                    tail: String::new(),
                    method: Method::POST,
                    body: rpc("eth_gasPrice"),
                    headers: ensure_json(Default::default()),
                    allowed_host_substr: Vec::new(),
                };
            }
            "chainid" | "chain_id" => {
                return AdaptResult {
                    tail: String::new(),
                    method: Method::POST,
                    body: rpc("eth_chainId"),
                    headers: ensure_json(Default::default()),
                    allowed_host_substr: Vec::new(),
                };
            }
            _ => {}
        }

        if let Some(addr) = ltail.strip_prefix("balance/") {
            if !addr.is_empty() {
                let payload = json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "eth_getBalance",
                    "params": [normalize_hex(addr), "latest"],
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
    }

    AdaptResult::pass_through(tail, method, body)
}
