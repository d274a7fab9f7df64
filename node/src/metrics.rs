//! # Prometheus Metrics
//!
//! Operational metrics for the wallet node, scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Wallet transactions submitted.
    pub transactions_submitted_total: IntCounter,
    /// Confirmations recorded.
    pub confirmations_total: IntCounter,
    /// Wallet transactions executed successfully.
    pub transactions_executed_total: IntCounter,
    /// State-changing calls that were rejected and rolled back.
    pub calls_failed_total: IntCounter,
    /// Wallets currently deployed across all registries.
    pub wallets_deployed: IntGauge,
    /// Time spent handling one JSON-RPC call.
    pub rpc_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("quorum".into()), None)?;

        let transactions_submitted_total = IntCounter::new(
            "transactions_submitted_total",
            "Total number of wallet transactions submitted",
        )?;
        registry.register(Box::new(transactions_submitted_total.clone()))?;

        let confirmations_total = IntCounter::new(
            "confirmations_total",
            "Total number of transaction confirmations recorded",
        )?;
        registry.register(Box::new(confirmations_total.clone()))?;

        let transactions_executed_total = IntCounter::new(
            "transactions_executed_total",
            "Total number of wallet transactions executed",
        )?;
        registry.register(Box::new(transactions_executed_total.clone()))?;

        let calls_failed_total = IntCounter::new(
            "calls_failed_total",
            "Total number of state-changing calls that failed and were rolled back",
        )?;
        registry.register(Box::new(calls_failed_total.clone()))?;

        let wallets_deployed =
            IntGauge::new("wallets_deployed", "Number of wallets currently deployed")?;
        registry.register(Box::new(wallets_deployed.clone()))?;

        let rpc_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rpc_latency_seconds",
                "JSON-RPC call handling latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(rpc_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            transactions_submitted_total,
            confirmations_total,
            transactions_executed_total,
            calls_failed_total,
            wallets_deployed,
            rpc_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_prefixed_names() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.transactions_submitted_total.inc();
        metrics.wallets_deployed.set(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("quorum_transactions_submitted_total 1"));
        assert!(text.contains("quorum_wallets_deployed 3"));
    }
}
