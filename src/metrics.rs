//! Prometheus gauges and counters exported at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder};

lazy_static! {
    static ref NODES_TOTAL: GaugeVec = register_gauge_vec!(
        "rpcf_nodes_total",
        "Total upstreams per network",
        &["network"]
    )
    .unwrap();
    static ref NODES_HEALTHY: GaugeVec = register_gauge_vec!(
        "rpcf_nodes_healthy",
        "Healthy upstreams per network",
        &["network"]
    )
    .unwrap();
    static ref PROXY_SUCCESS: CounterVec = register_counter_vec!(
        "rpcf_proxy_success_total",
        "Successful proxy calls",
        &["network"]
    )
    .unwrap();
    static ref PROXY_FAIL: CounterVec = register_counter_vec!(
        "rpcf_proxy_fail_total",
        "Failed proxy calls",
        &["network"]
    )
    .unwrap();
    static ref WS_CONNECTED: CounterVec = register_counter_vec!(
        "ws_connected_total",
        "WebSocket bridge sessions established",
        &["network"]
    )
    .unwrap();
    static ref WS_ERRORS: CounterVec = register_counter_vec!(
        "ws_errors_total",
        "WebSocket bridge errors",
        &["network"]
    )
    .unwrap();
}

pub fn set_nodes_total(network: &str, v: f64) {
    NODES_TOTAL.with_label_values(&[network]).set(v);
}

pub fn set_nodes_healthy(network: &str, v: f64) {
    NODES_HEALTHY.with_label_values(&[network]).set(v);
}

pub fn inc_proxy_success(network: &str) {
    PROXY_SUCCESS.with_label_values(&[network]).inc();
}

pub fn inc_proxy_fail(network: &str) {
    PROXY_FAIL.with_label_values(&[network]).inc();
}

pub fn inc_ws_connected(network: &str) {
    WS_CONNECTED.with_label_values(&[network]).inc();
}

pub fn inc_ws_error(network: &str) {
    WS_ERRORS.with_label_values(&[network]).inc();
}

/// Renders the process's full Prometheus text exposition.
pub fn render() -> String {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buf).expect("metrics encode");
    String::from_utf8(buf).expect("metrics utf8")
}
