//! Prometheus Metrics Registry - Orchestration Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers request throughput, transitions, failure reasons, bot load,
//! platform call outcomes, and confirmation latency.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Centralized Prometheus metrics for the orchestrator.
///
/// All metrics follow the naming convention `pawmart_bot_*` and carry a
/// `flow` label where trade and custody diverge.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Requests admitted per flow.
    pub requests_initiated: IntCounterVec,
    /// Status transitions applied, per flow and target status.
    pub transitions_total: IntCounterVec,
    /// Failed requests per flow and reason.
    pub failures_total: IntCounterVec,
    /// Currently active (non-terminal) requests per flow.
    pub active_requests: IntGaugeVec,
    /// Current load per bot.
    pub bot_load: IntGaugeVec,
    /// Platform API calls per endpoint and outcome.
    pub social_calls_total: IntCounterVec,
    /// Seconds from admission to friendship confirmation.
    pub confirmation_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_initiated = IntCounterVec::new(
            Opts::new("pawmart_bot_requests_initiated_total", "Requests admitted"),
            &["flow"],
        )?;

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "pawmart_bot_transitions_total",
                "Status transitions applied",
            ),
            &["flow", "status"],
        )?;

        let failures_total = IntCounterVec::new(
            Opts::new("pawmart_bot_failures_total", "Requests failed"),
            &["flow", "reason"],
        )?;

        let active_requests = IntGaugeVec::new(
            Opts::new(
                "pawmart_bot_active_requests",
                "Active (non-terminal) requests",
            ),
            &["flow"],
        )?;

        let bot_load = IntGaugeVec::new(
            Opts::new("pawmart_bot_load", "Concurrent requests held per bot"),
            &["bot"],
        )?;

        let social_calls_total = IntCounterVec::new(
            Opts::new(
                "pawmart_bot_social_calls_total",
                "Platform API calls by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )?;

        let confirmation_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pawmart_bot_confirmation_seconds",
                "Seconds from admission to friendship confirmation",
            )
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["flow"],
        )?;

        // Register all metrics
        registry.register(Box::new(requests_initiated.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;
        registry.register(Box::new(active_requests.clone()))?;
        registry.register(Box::new(bot_load.clone()))?;
        registry.register(Box::new(social_calls_total.clone()))?;
        registry.register(Box::new(confirmation_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_initiated,
            transitions_total,
            failures_total,
            active_requests,
            bot_load,
            social_calls_total,
            confirmation_seconds,
        })
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let registry = metrics_self.registry.clone();
                async move {
                    let encoder = TextEncoder::new();
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    if encoder.encode(&metric_families, &mut buffer).is_err() {
                        return String::new();
                    }
                    String::from_utf8(buffer).unwrap_or_default()
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
