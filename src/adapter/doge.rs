use http::Method;

use super::{ensure_json, AdaptResult};

pub fn adapt(tail: &str, method: &Method, body: &[u8]) -> AdaptResult {
    let ltail = tail.trim_start_matches('/').to_lowercase();

    if ltail.is_empty() {
        return AdaptResult {
            tail: "rest/chaininfo.json".to_string(),
            method: Method::GET,
            body: Vec::new(),
            headers: Default::default(),
            allowed_host_substr: Vec::new(),
        };
    }

    if ltail.starts_with("rest/") || ltail.starts_with("api/") {
        return AdaptResult::pass_through(tail, method, body);
    }

    AdaptResult {
        tail: tail.to_string(),
        method: method.clone(),
        body: body.to_vec(),
        headers: ensure_json(Default::default()),
        allowed_host_substr: Vec::new(),
    }
}
