use std::net::SocketAddr;

use crate::common::types::ProviderTag;

pub fn init_metrics() {
    let port: u16 = std::env::var("ADDRESS_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    println!("[metrics] Attempting to install Prometheus exporter on {}", addr);
    match builder.install() {
        Ok(()) => {
            println!(
                "[metrics] Prometheus exporter installed and listening on http://{}/metrics",
                addr
            );
        }
        Err(e) => {
            println!(
                "[metrics] Prometheus exporter install failed (possibly already installed): {}",
                e
            );
        }
    }
}

/// Record one provider call with its outcome and latency
pub fn provider_call(provider: ProviderTag, succeeded: bool, latency_ms: u64) {
    let outcome = if succeeded { "success" } else { "failure" };
    ::metrics::counter!(
        "address_provider_calls_total",
        "provider" => provider.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(
        "address_provider_latency_seconds",
        "provider" => provider.as_str()
    )
    .record(latency_ms as f64 / 1000.0);
}

/// A provider under-delivered and the cascade moved to the next one
pub fn fallback_attempted(provider: ProviderTag) {
    ::metrics::counter!(
        "address_cascade_fallbacks_total",
        "provider" => provider.as_str()
    )
    .increment(1);
}

/// A candidate was dropped by the dedup/authenticity filter
pub fn candidate_filtered(reason: &'static str) {
    ::metrics::counter!(
        "address_candidates_filtered_total",
        "reason" => reason
    )
    .increment(1);
}

/// One search request served, labelled by endpoint
pub fn request_served(endpoint: &'static str) {
    ::metrics::counter!(
        "address_requests_total",
        "endpoint" => endpoint
    )
    .increment(1);
}
