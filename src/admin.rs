//! C8 — Admin Surface: authenticated mutation of the Registry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::NetworkConfig;
use crate::error::AppError;
use crate::health::Checker;
use crate::registry::{sanitize, Registry, Upstream};

pub struct AdminState {
    pub registry: Arc<Registry>,
    pub checker: Arc<Checker>,
    pub admin_key: String,
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let got = headers.get("x-admin-key").and_then(|v| v.to_str().ok()).unwrap_or_default();
    if got != expected {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct BulkResult {
    route: String,
    status: &'static str,
}

pub async fn add_network(
    State(admin): State<Arc<AdminState>>,
    headers: HeaderMap,
    Json(cfg): Json<NetworkConfig>,
) -> Result<Response, AppError> {
    authorize(&headers, &admin.admin_key)?;
    if cfg.route.is_empty() || cfg.protocol.is_empty() || cfg.nodes.is_empty() {
        return Err(AppError::BadRequest("missing required field".to_string()));
    }
    let Some(protocol) = crate::registry::Protocol::parse(&cfg.protocol) else {
        return Err(AppError::BadRequest("unknown protocol".to_string()));
    };
    let declared: Vec<Upstream> = cfg.nodes.clone().into_iter().map(Upstream::from).collect();
    let best = admin.checker.update_network(&cfg.route, protocol, &declared).await;
    if best.is_empty() {
        return Err(AppError::BadRequest("no healthy nodes".to_string()));
    }
    admin.registry.add_network(cfg, best).await;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

pub async fn add_networks_bulk(
    State(admin): State<Arc<AdminState>>,
    headers: HeaderMap,
    Json(cfgs): Json<Vec<NetworkConfig>>,
) -> Result<Response, AppError> {
    authorize(&headers, &admin.admin_key)?;
    let mut results = Vec::with_capacity(cfgs.len());
    for cfg in cfgs {
        let route = cfg.route.clone();
        if admin.registry.exists(&route).await {
            results.push(BulkResult { route, status: "skipped" });
            continue;
        }
        if cfg.route.is_empty() || cfg.protocol.is_empty() || cfg.nodes.is_empty() {
            results.push(BulkResult { route, status: "skipped" });
            continue;
        }
        let Some(protocol) = crate::registry::Protocol::parse(&cfg.protocol) else {
            results.push(BulkResult { route, status: "skipped" });
            continue;
        };
        let declared: Vec<Upstream> = cfg.nodes.clone().into_iter().map(Upstream::from).collect();
        let best = admin.checker.update_network(&cfg.route, protocol, &declared).await;
        if best.is_empty() {
            results.push(BulkResult { route, status: "failed" });
            continue;
        }
        admin.registry.add_network(cfg, best).await;
        results.push(BulkResult { route, status: "added" });
    }
    Ok(Json(results).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AddNodeRequest {
    pub url: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, rename = "isPrivate")]
    pub is_private: bool,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub tor: bool,
}

pub async fn add_node(
    State(admin): State<Arc<AdminState>>,
    headers: HeaderMap,
    Path(network): Path<String>,
    Json(req): Json<AddNodeRequest>,
) -> Result<Response, AppError> {
    authorize(&headers, &admin.admin_key)?;
    let Some(protocol) = admin.registry.protocol_of(&network).await else {
        return Err(AppError::NotFound);
    };
    let node = Upstream {
        url: req.url,
        priority: if req.priority == 0 { 1 } else { req.priority },
        is_private: req.is_private,
        headers: req.headers,
        tor: req.tor,
    };
    let probed = admin.checker.update_network(&network, protocol, std::slice::from_ref(&node)).await;
    if probed.is_empty() {
        return Err(AppError::BadRequest("node is not healthy".to_string()));
    }
    admin.registry.add_node(&network, node).await;
    for n in probed {
        admin.registry.append_best(&network, n).await;
    }
    Ok(Json(json!({ "status": "ok" })).into_response())
}

pub async fn list_nodes(
    State(admin): State<Arc<AdminState>>,
    headers: HeaderMap,
    Path(network): Path<String>,
) -> Result<Response, AppError> {
    authorize(&headers, &admin.admin_key)?;
    let best = admin.registry.best(&network).await;
    Ok(Json(sanitize(&best)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct DeleteNodeQuery {
    pub url: String,
}

pub async fn delete_node(
    State(admin): State<Arc<AdminState>>,
    headers: HeaderMap,
    Path(network): Path<String>,
    axum::extract::Query(q): axum::extract::Query<DeleteNodeQuery>,
) -> Result<Response, AppError> {
    authorize(&headers, &admin.admin_key)?;
    admin.registry.delete_node(&network, &q.url).await;
    Ok(Json(json!({ "status": "ok" })).into_response())
}
