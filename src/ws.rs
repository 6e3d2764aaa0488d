//! C6 — WebSocket bridge: inbound axum upgrade <-> outbound tungstenite leg.

use std::sync::Arc;

use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use crate::error::AppError;
use crate::metrics;
use crate::registry::Registry;
use crate::secrets;

pub async fn handle_ws(
    State(registry): State<Arc<Registry>>,
    Path(network): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let best = registry.best(&network).await;
    let Some(first) = best.first() else {
        return Err(AppError::NoAvailableNodes);
    };
    if !first.node.url.to_lowercase().starts_with("ws") {
        return Err(AppError::NotWebsocket);
    }
    let upstream_url = first.node.url.clone();
    Ok(ws.on_upgrade(move |socket| bridge(socket, network, upstream_url)))
}

async fn bridge(client: WebSocket, network: String, upstream_url: String) {
    let upstream = match tokio_tungstenite::connect_async(&upstream_url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::warn!(network = %network, upstream = %upstream_url, error = %e, "ws_dial_failed");
            metrics::inc_ws_error(&network);
            return;
        }
    };

    tracing::info!(network = %network, upstream = %upstream_url, "ws_proxy_connected");
    metrics::inc_ws_connected(&network);

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let network_a = network.clone();
    let client_to_upstream = async move {
        while let Some(msg) = client_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(network = %network_a, error = %e, "ws_client_read_error");
                    metrics::inc_ws_error(&network_a);
                    return;
                }
            };
            if let AxumMessage::Text(ref text) = msg {
                log_subscription(&network_a, text);
            }
            let forwarded = match to_tungstenite(msg) {
                Some(m) => m,
                None => continue,
            };
            if let Err(e) = upstream_tx.send(forwarded).await {
                tracing::warn!(network = %network_a, error = %e, "ws_upstream_write_error");
                metrics::inc_ws_error(&network_a);
                return;
            }
        }
    };

    let network_b = network.clone();
    let upstream_to_client = async move {
        while let Some(msg) = upstream_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(network = %network_b, error = %e, "ws_upstream_read_error");
                    metrics::inc_ws_error(&network_b);
                    return;
                }
            };
            let forwarded = match to_axum(msg) {
                Some(m) => m,
                None => continue,
            };
            if let Err(e) = client_tx.send(forwarded).await {
                tracing::warn!(network = %network_b, error = %e, "ws_client_write_error");
                metrics::inc_ws_error(&network_b);
                return;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }
}

fn log_subscription(network: &str, payload: &str) {
    if payload.contains("eth_subscribe") {
        tracing::info!(network, payload = %secrets::redact_string(payload), "ws_subscribe");
    }
    if payload.contains("eth_unsubscribe") {
        tracing::info!(network, payload = %secrets::redact_string(payload), "ws_unsubscribe");
    }
}

fn to_tungstenite(msg: AxumMessage) -> Option<TungsteniteMessage> {
    match msg {
        AxumMessage::Text(t) => Some(TungsteniteMessage::Text(t)),
        AxumMessage::Binary(b) => Some(TungsteniteMessage::Binary(b)),
        AxumMessage::Ping(p) => Some(TungsteniteMessage::Ping(p)),
        AxumMessage::Pong(p) => Some(TungsteniteMessage::Pong(p)),
        AxumMessage::Close(_) => None,
    }
}

fn to_axum(msg: TungsteniteMessage) -> Option<AxumMessage> {
    match msg {
        TungsteniteMessage::Text(t) => Some(AxumMessage::Text(t)),
        TungsteniteMessage::Binary(b) => Some(AxumMessage::Binary(b)),
        TungsteniteMessage::Ping(p) => Some(AxumMessage::Ping(p)),
        TungsteniteMessage::Pong(p) => Some(AxumMessage::Pong(p)),
        TungsteniteMessage::Close(_) | TungsteniteMessage::Frame(_) => None,
    }
}
