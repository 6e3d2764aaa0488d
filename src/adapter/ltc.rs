use http::Method;

use super::{ensure_json, AdaptResult};

pub fn adapt(tail: &str, method: &Method, body: &[u8], base_url: &str) -> AdaptResult {
    let ltail = tail.trim_start_matches('/').to_lowercase();
    let lbase = base_url.to_lowercase();

    if lbase.contains("tatum.io") {
        return AdaptResult {
            tail: String::new(),
            method: Method::POST,
            body: br#"{"jsonrpc":"2.0","method":"getblockcount","params":[],"id":1}"#.to_vec(),
            headers: ensure_json(Default::default()),
            allowed_host_substr: Vec::new(),
        };
    }

    if ltail.starts_with("rest/") || ltail.starts_with("api/") {
        return AdaptResult::pass_through(tail, method, body);
    }

    if ltail.is_empty() {
        let tail = if lbase.contains("sochain.com") {
            "api/v2/get_info/LTC"
        } else if lbase.contains("blockbook") || lbase.contains("blockchair") {
            "api/v2"
        } else {
            "rest/chaininfo.json"
        };
        return AdaptResult {
            tail: tail.to_string(),
            method: Method::GET,
            body: Vec::new(),
            headers: Default::default(),
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
