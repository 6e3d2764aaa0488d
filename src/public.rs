//! Convenience endpoints for external collaborators: thin wrappers over the
//! proxy dispatcher for a handful of common eth/btc/nft calls, plus the
//! sanitized `/active-nodes` snapshot. Behavior beyond what's forwarded here
//! is up to whatever upstream is configured for these networks.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::AppError;
use crate::proxy::Dispatcher;
use crate::registry::{sanitize, Registry};

pub struct PublicState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<Registry>,
    pub tor_socks5: String,
}

async fn forward(
    state: &PublicState,
    network: &str,
    tail: &str,
    method: Method,
    body: Vec<u8>,
) -> Result<Response, AppError> {
    state.dispatcher.serve(network, tail, method, HeaderMap::new(), body.into(), None, &state.tor_socks5).await
}

fn rpc(method: &str, params: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params })).unwrap()
}

pub async fn network_fees(State(state): State<Arc<PublicState>>) -> Result<Response, AppError> {
    forward(&state, "btc", "fees", Method::GET, Vec::new()).await
}

pub async fn eth_fee(State(state): State<Arc<PublicState>>) -> Result<Response, AppError> {
    forward(&state, "eth", "gasprice", Method::GET, Vec::new()).await
}

pub async fn eth_max_priority_fee(State(state): State<Arc<PublicState>>) -> Result<Response, AppError> {
    let body = rpc("eth_maxPriorityFeePerGas", json!([]));
    forward(&state, "eth", "", Method::POST, body).await
}

pub async fn eth_estimate_gas(
    State(state): State<Arc<PublicState>>,
    Json(tx): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let body = rpc("eth_estimateGas", json!([tx]));
    forward(&state, "eth", "", Method::POST, body).await
}

pub async fn btc_fees(State(state): State<Arc<PublicState>>) -> Result<Response, AppError> {
    forward(&state, "btc", "fees", Method::GET, Vec::new()).await
}

pub async fn btc_balance(
    State(state): State<Arc<PublicState>>,
    Path(addr): Path<String>,
) -> Result<Response, AppError> {
    forward(&state, "btc", &format!("balance/{addr}"), Method::GET, Vec::new()).await
}

pub async fn nft_get_all(
    State(state): State<Arc<PublicState>>,
    Path(addr): Path<String>,
) -> Result<Response, AppError> {
    forward(&state, "nft", &format!("get-all-nfts/{addr}"), Method::GET, Vec::new()).await
}

pub async fn nft_metadata(
    State(state): State<Arc<PublicState>>,
    Path((contract, token_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    forward(&state, "nft", &format!("get-nft-metadata/{contract}/{token_id}"), Method::GET, Vec::new()).await
}

/// `POST /active-nodes` — best sets per network, sanitized for external view.
pub async fn active_nodes(State(state): State<Arc<PublicState>>) -> Result<Response, AppError> {
    let all = state.registry.all().await;
    let out: std::collections::HashMap<String, _> =
        all.into_iter().map(|(name, st)| (name, sanitize(&st.best))).collect();
    Ok(Json(out).into_response())
}
