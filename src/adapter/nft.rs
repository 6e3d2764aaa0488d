use http::Method;
use num_bigint::BigUint;
use num_traits::Num;
use serde_json::{json, Value};

use super::{ensure_json, normalize_hex, AdaptResult};

const OWNER_OF_SELECTOR: &str = "6352211e";

/// Virtual network: `/{contract}/{tokenId}` becomes an `eth_call` to
/// `ownerOf(uint256)` against an EVM upstream. A request that already is a
/// JSON-RPC `eth_call` passes through untouched.
pub fn adapt(tail: &str, method: &Method, body: &[u8]) -> AdaptResult {
    if let Ok(Some(m)) = serde_json::from_slice::<Value>(body).map(|v| {
        v.get("method").and_then(Value::as_str).map(str::to_string)
    }) {
        if m.eq_ignore_ascii_case("eth_call") {
            return AdaptResult {
                tail: tail.to_string(),
                method: method.clone(),
                body: body.to_vec(),
                headers: ensure_json(Default::default()),
                allowed_host_substr: Vec::new(),
            };
        }
    }

    let parts: Vec<&str> = tail.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() >= 2 && is_hex_address(parts[0]) {
        let contract = parts[0];
        let token_id = parts[1];
        let data = build_owner_of_data(token_id);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": normalize_hex(contract), "data": data },
                "latest",
            ],
        });
        return AdaptResult {
            tail: String::new(),
            method: Method::POST,
            body: serde_json::to_vec(&payload).unwrap(),
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

fn is_hex_address(s: &str) -> bool {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// `ownerOf(uint256)` selector followed by the token id, left-padded to a
/// 32-byte big-endian integer.
fn build_owner_of_data(token_id: &str) -> String {
    let id = if let Some(hex) = token_id.strip_prefix("0x").or_else(|| token_id.strip_prefix("0X")) {
        BigUint::from_str_radix(hex, 16).unwrap_or_default()
    } else {
        BigUint::from_str_radix(token_id, 10).unwrap_or_default()
    };
    let mut bytes = id.to_bytes_be();
    if bytes.len() > 32 {
        bytes = bytes[bytes.len() - 32..].to_vec();
    }
    let mut padded = [0u8; 32];
    padded[32 - bytes.len()..].copy_from_slice(&bytes);
    format!("0x{OWNER_OF_SELECTOR}{}", hex::encode(padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_40_hex_char_address() {
        assert!(is_hex_address("0x00000000000000000000000000000000000000"));
        assert!(is_hex_address("0000000000000000000000000000000000000a"));
        assert!(!is_hex_address("short"));
    }

    #[test]
    fn pads_token_id_to_32_bytes() {
        let data = build_owner_of_data("1");
        assert_eq!(
            data,
            "0x6352211e0000000000000000000000000000000000000000000000000000000000000001"
        );
    }
}
