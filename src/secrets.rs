//! C1 — Secret Redactor.
//!
//! Masks known-sensitive header names and redacts any string containing a
//! value drawn from sensitive environment variables. The env snapshot is
//! taken once, lazily, on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

const HEADER_KEYS: &[&str] = &["x-api-key", "authorization", "proxy-authorization", "api-key"];

const ENV_NAME_PATTERNS: &[&str] = &[
    "API_KEY",
    "TOKEN",
    "SECRET",
    "PASSWORD",
    "ACCESS_KEY",
    "PRIVATE_KEY",
];

static SENSITIVE_ENVS: OnceLock<Vec<String>> = OnceLock::new();

fn sensitive_envs() -> &'static [String] {
    SENSITIVE_ENVS
        .get_or_init(|| {
            std::env::vars()
                .filter_map(|(name, val)| {
                    if val.is_empty() {
                        return None;
                    }
                    let up = name.to_uppercase();
                    ENV_NAME_PATTERNS
                        .iter()
                        .any(|pat| up.contains(pat))
                        .then_some(val)
                })
                .collect()
        })
        .as_slice()
}

/// Replaces the values of known-sensitive header names with `***`.
pub fn redact_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    if headers.is_empty() {
        return headers.clone();
    }
    headers
        .iter()
        .map(|(k, v)| {
            if HEADER_KEYS.contains(&k.to_lowercase().as_str()) {
                (k.clone(), "***".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// Replaces every occurrence of a sensitive env value inside `s` with `[HIDDEN]`.
pub fn redact_string(s: &str) -> String {
    let mut out = s.to_string();
    for val in sensitive_envs() {
        if val.is_empty() {
            continue;
        }
        out = out.replace(val.as_str(), "[HIDDEN]");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_known_header_keys_case_insensitively() {
        let mut h = HashMap::new();
        h.insert("X-Api-Key".to_string(), "secret".to_string());
        h.insert("Authorization".to_string(), "Bearer token".to_string());
        h.insert("Custom".to_string(), "ok".to_string());
        let clean = redact_headers(&h);
        assert_eq!(clean["X-Api-Key"], "***");
        assert_eq!(clean["Authorization"], "***");
        assert_eq!(clean["Custom"], "ok");
    }

    #[test]
    fn empty_headers_pass_through() {
        let h: HashMap<String, String> = HashMap::new();
        assert!(redact_headers(&h).is_empty());
    }
}
