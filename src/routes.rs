//! Router assembly and the CORS middleware carried over from the original
//! server's `withCORS` wrapper.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::admin::{self, AdminState};
use crate::error::AppError;
use crate::gossip::{self, AnnounceRequest, GossipMessage, StateMessage};
use crate::health::Checker;
use crate::peers::PeerStore;
use crate::proxy::{self, Dispatcher};
use crate::public::{self, PublicState};
use crate::registry::Registry;
use crate::ws;

pub struct GossipState {
    pub peers: Arc<PeerStore>,
    pub registry: Arc<Registry>,
    pub self_id: String,
    pub self_addr: String,
    pub shared_secret: String,
    pub discovered_ttl: Duration,
}

async fn handle_announce(
    State(state): State<Arc<GossipState>>,
    Json(req): Json<AnnounceRequest>,
) -> Result<Response, AppError> {
    let resp = gossip::handle_announce(&state.peers, &state.self_id, &state.self_addr, &state.shared_secret, req).await?;
    Ok(axum::Json(resp).into_response())
}

async fn handle_gossip(State(state): State<Arc<GossipState>>, Json(msg): Json<GossipMessage>) -> Response {
    gossip::handle_gossip(&state.peers, msg).await;
    StatusCode::OK.into_response()
}

async fn handle_gossip_state(State(state): State<Arc<GossipState>>, Json(msg): Json<StateMessage>) -> Response {
    gossip::handle_state(&state.registry, msg, state.discovered_ttl).await;
    StatusCode::OK.into_response()
}

async fn handle_heartbeat(Json(hb): Json<crate::gossip::leader::Heartbeat>) -> Response {
    tracing::debug!(leader = %hb.leader_id, "heartbeat_received");
    StatusCode::OK.into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler() -> Response {
    (StatusCode::OK, crate::metrics::render()).into_response()
}

/// Mirrors the original's CORS wrapper: wide-open allow-origin, a fixed
/// header/method allowlist, and a 204 short-circuit for preflight.
async fn with_cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut res = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(res.headers_mut());
        return res;
    }
    let mut res = next.run(req).await;
    apply_cors_headers(res.headers_mut());
    res
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
    headers.insert(
        "Access-Control-Allow-Headers",
        "Content-Type, Authorization, x-admin-key, x-rpc-switch".parse().unwrap(),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        "GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS".parse().unwrap(),
    );
}

pub struct RouterDeps {
    pub registry: Arc<Registry>,
    pub checker: Arc<Checker>,
    pub dispatcher: Arc<Dispatcher>,
    pub gossip_state: Arc<GossipState>,
    pub admin_key: String,
    pub tor_socks5: String,
}

pub fn build_router(deps: RouterDeps) -> Router {
    let admin_state = Arc::new(AdminState {
        registry: deps.registry.clone(),
        checker: deps.checker.clone(),
        admin_key: deps.admin_key.clone(),
    });
    let public_state = Arc::new(PublicState {
        dispatcher: deps.dispatcher.clone(),
        registry: deps.registry.clone(),
        tor_socks5: deps.tor_socks5.clone(),
    });

    let gossip_routes = Router::new()
        .route("/announce", post(handle_announce))
        .route("/gossip", post(handle_gossip))
        .route("/gossip-state", post(handle_gossip_state))
        .route("/heartbeat", post(handle_heartbeat))
        .with_state(deps.gossip_state.clone());

    let public_routes = Router::new()
        .route("/active-nodes", post(public::active_nodes))
        .route("/networkfees", get(public::network_fees))
        .route("/proxy/eth/fee", get(public::eth_fee))
        .route("/proxy/eth/maxPriorityFee", get(public::eth_max_priority_fee))
        .route("/proxy/eth/estimateGas", post(public::eth_estimate_gas))
        .route("/proxy/btc/fees", get(public::btc_fees))
        .route("/proxy/btc/balance/:addr", get(public::btc_balance))
        .route("/proxy/nft/get-all-nfts/:addr", get(public::nft_get_all))
        .route("/proxy/nft/get-nft-metadata/:contract/:tokenId", get(public::nft_metadata))
        .with_state(public_state);

    let admin_routes = Router::new()
        .route("/admin/networks", post(admin::add_network))
        .route("/admin/networks/bulk", post(admin::add_networks_bulk))
        .route(
            "/admin/:network/nodes",
            get(admin::list_nodes).post(admin::add_node).delete(admin::delete_node),
        )
        .with_state(admin_state);

    let ws_routes = Router::new().route("/ws/:network", get(ws::handle_ws)).with_state(deps.registry.clone());

    let proxy_routes = Router::new()
        .route("/:network/*tail", axum::routing::any(proxy::handle_proxy))
        .route("/:network", axum::routing::any(proxy::handle_proxy_no_tail))
        .with_state((deps.dispatcher.clone(), Arc::new(deps.tor_socks5.clone())));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .merge(gossip_routes)
        .merge(public_routes)
        .merge(admin_routes)
        .merge(ws_routes)
        .merge(proxy_routes)
        .layer(middleware::from_fn(with_cors))
}
