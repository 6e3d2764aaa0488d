//! C6 — Proxy Dispatcher: path demux, candidate filtering, sequential
//! failover, rate-limit detection.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use serde_json::Value;

use crate::adapter;
use crate::error::AppError;
use crate::health::default_timeout_for;
use crate::metrics;
use crate::registry::{NodeWithPing, Registry};

pub struct Dispatcher {
    registry: Arc<Registry>,
    client: Client,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Dispatcher { registry, client: Client::builder().build().expect("http client") }
    }

    fn client_for(&self, tor: bool, tor_socks5: &str) -> Client {
        if !tor {
            return self.client.clone();
        }
        Client::builder()
            .proxy(reqwest::Proxy::all(format!("socks5h://{tor_socks5}")).expect("valid tor proxy"))
            .build()
            .unwrap_or_else(|_| self.client.clone())
    }

    /// No explicit cancellation token: when the client disconnects, axum drops
    /// the handler future (and the `send().await` nested inside it), which
    /// cancels the in-flight outbound request for free.
    pub async fn serve(
        &self,
        network: &str,
        tail: &str,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
        raw_query: Option<&str>,
        tor_socks5: &str,
    ) -> Result<Response, AppError> {
        let candidates = self.registry.best(network).await;
        if candidates.is_empty() {
            return Err(AppError::NoAvailableNodes);
        }
        let protocol = self.registry.protocol_of(network).await.ok_or(AppError::NoAvailableNodes)?;

        let first_url = candidates[0].node.url.clone();
        let adapted = adapter::adapt(network, protocol, &first_url, tail, &method, &body);

        let filtered: Vec<&NodeWithPing> = if adapted.allowed_host_substr.is_empty() {
            candidates.iter().collect()
        } else {
            candidates
                .iter()
                .filter(|c| {
                    let lower = c.node.url.to_lowercase();
                    adapted.allowed_host_substr.iter().any(|s| lower.contains(&s.to_lowercase()))
                })
                .collect()
        };
        if filtered.is_empty() {
            return Err(AppError::NoAllowedUpstreams);
        }

        let declared_timeout_ms = self.registry.timeout_ms(network).await;
        let deadline = if declared_timeout_ms > 0 {
            Duration::from_millis(declared_timeout_ms)
        } else {
            default_timeout_for(protocol)
        };

        let rewrote_method = adapted.method != method;

        for (attempt, candidate) in filtered.iter().enumerate() {
            let outbound_method = reqwest_method(&adapted.method);
            let url = build_outbound_url(&candidate.node.url, &adapted.tail, rewrote_method, raw_query);

            let mut req_headers = clone_headers(&headers);
            for (k, v) in &adapted.headers {
                req_headers.insert(k.clone(), v.clone());
            }
            for (k, v) in &candidate.node.headers {
                req_headers.insert(k.clone(), v.clone());
            }
            if matches!(outbound_method, reqwest::Method::POST | reqwest::Method::PUT)
                && !req_headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"))
            {
                req_headers.insert("Content-Type".to_string(), "application/json".to_string());
            }

            let client = self.client_for(candidate.node.tor, tor_socks5);
            let mut builder = client.request(outbound_method, &url).timeout(deadline).body(adapted.body.clone());
            for (k, v) in &req_headers {
                if let (Ok(name), Ok(val)) = (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
                    builder = builder.header(name, val);
                }
            }

            let resp = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(network, upstream = %candidate.node.url, attempt, error = %e, "upstream transport error");
                    metrics::inc_proxy_fail(network);
                    continue;
                }
            };

            let status = resp.status();
            let resp_headers = resp.headers().clone();
            let buf = resp.bytes().await.unwrap_or_default();

            if is_rate_limited(status.as_u16(), &resp_headers, &buf) || status.as_u16() >= 500 {
                tracing::warn!(network, upstream = %candidate.node.url, status = status.as_u16(), attempt, "retryable upstream response");
                metrics::inc_proxy_fail(network);
                continue;
            }

            metrics::inc_proxy_success(network);
            let mut out = Response::builder().status(status.as_u16());
            for (k, v) in resp_headers.iter() {
                out = out.header(k, v);
            }
            return out.body(axum::body::Body::from(buf)).map_err(|e| AppError::BadRequest(e.to_string()));
        }

        metrics::inc_proxy_fail(network);
        Err(AppError::AllUpstreamsFailed)
    }
}

fn clone_headers(headers: &HeaderMap) -> std::collections::HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

fn build_outbound_url(base: &str, tail: &str, rewrote_method: bool, raw_query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    let mut url = if tail.is_empty() { base.to_string() } else { format!("{base}/{tail}") };
    if !rewrote_method {
        if let Some(q) = raw_query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
    }
    url
}

fn reqwest_method(m: &Method) -> reqwest::Method {
    reqwest::Method::from_bytes(m.as_str().as_bytes()).unwrap_or(reqwest::Method::GET)
}

/// Rate-limit detection (§4.4): 429, non-empty Retry-After, X-RateLimit-Remaining
/// == 0, or a JSON body whose `message`/`error.message` mentions rate limiting.
pub fn is_rate_limited(status: u16, headers: &axum::http::HeaderMap, body: &[u8]) -> bool {
    if status == 429 {
        return true;
    }
    if headers.get("retry-after").and_then(|v| v.to_str().ok()).map(|s| !s.trim().is_empty()).unwrap_or(false) {
        return true;
    }
    if headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.eq_ignore_ascii_case("0"))
        .unwrap_or(false)
    {
        return true;
    }
    if let Ok(v) = serde_json::from_slice::<Value>(body) {
        if let Some(msg) = v.get("error").and_then(|e| e.get("message")).and_then(Value::as_str) {
            if looks_like_rate_limit(msg) {
                return true;
            }
        }
        if let Some(msg) = v.get("message").and_then(Value::as_str) {
            if looks_like_rate_limit(msg) {
                return true;
            }
        }
    }
    false
}

fn looks_like_rate_limit(s: &str) -> bool {
    let s = s.to_lowercase();
    s.contains("rate limit") || s.contains("too many request")
}

pub async fn handle_proxy(
    State((dispatcher, tor_socks5)): State<(Arc<Dispatcher>, Arc<String>)>,
    Path((network, tail)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response, AppError> {
    if network.trim().is_empty() {
        return Err(AppError::NotFound);
    }
    dispatcher.serve(&network, &tail, method, headers, body, raw_query.as_deref(), &tor_socks5).await
}

/// Handles `/{network}` with no trailing tail segment.
pub async fn handle_proxy_no_tail(
    State((dispatcher, tor_socks5)): State<(Arc<Dispatcher>, Arc<String>)>,
    Path(network): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response, AppError> {
    if network.trim().is_empty() {
        return Err(AppError::NotFound);
    }
    dispatcher.serve(&network, "", method, headers, body, raw_query.as_deref(), &tor_socks5).await
}
