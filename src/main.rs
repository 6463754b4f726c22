//! PawMart Trade Orchestrator — Entry Point
//!
//! Initializes configuration, logging, the request journal, the bot
//! registry and the orchestrator. Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open request journal + replay in-flight requests
//! 4. Build bot registry + reconcile loads with replayed requests
//! 5. Create platform client (HTTP + retry + bounded concurrency)
//! 6. Create metrics registry, spawn health + metrics servers
//! 7. Build orchestrator, respawn confirmation watchers
//! 8. Spawn expiry sweeper
//! 9. Serve the bot-trading API
//! 10. Wait for SIGINT → graceful shutdown (drain→stop→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::api;
use adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use adapters::persistence::JournalStore;
use adapters::social::{SocialClient, SocialClientConfig};
use domain::bot::{BotRegistry, TradeBot};
use ports::store::RequestStore;
use usecases::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(&config.bot.log_level)
            }),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        bots = config.bots.len(),
        "Starting PawMart trade orchestrator"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Open the request journal and replay ──────────────
    let store = Arc::new(
        JournalStore::open(&config.persistence.data_dir)
            .await
            .context("Failed to open request journal")?,
    );
    let active = store
        .list_active()
        .await
        .context("Failed to list active requests")?;

    // ── 5. Build the bot registry and reconcile loads ───────
    let bots: Vec<TradeBot> = config
        .bots
        .iter()
        .map(|b| {
            TradeBot::new(
                b.id.as_str(),
                b.username.as_str(),
                b.user_id,
                b.game_id.as_str(),
                b.capacity,
                b.online,
            )
        })
        .collect();
    let registry = Arc::new(BotRegistry::new(bots));
    registry.reconcile(&active);
    info!(
        bots = registry.len(),
        recovered = active.len(),
        "Bot registry reconciled with replayed requests"
    );

    // ── 6. Create the platform client ───────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics")?);
    let social = Arc::new(
        SocialClient::new(SocialClientConfig::from(&config.social), Arc::clone(&metrics))
            .context("Failed to create platform client")?,
    );

    // ── 7. Spawn health server ──────────────────────────────
    let health_state = Arc::new(HealthState::new());
    let health_server =
        HealthServer::new(Arc::clone(&health_state), config.metrics.health_port);
    let health_handle = tokio::spawn({
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = health_server.run(shutdown_rx).await {
                error!(error = %e, "Health server failed");
            }
        }
    });

    // ── 8. Spawn Prometheus metrics server ──────────────────
    let metrics_handle = if config.metrics.enabled {
        let metrics_ref = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(bind, shutdown_rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── 9. Build the orchestrator and resume watchers ───────
    let orchestrator = Arc::new(Orchestrator::new(
        social,
        Arc::clone(&store),
        registry,
        Arc::clone(&metrics),
        &config.orchestrator,
        shutdown_tx.clone(),
    ));
    let resumed = Arc::clone(&orchestrator)
        .resume_watchers()
        .await
        .context("Failed to resume confirmation watchers")?;
    if resumed > 0 {
        info!(resumed, "In-flight requests picked up from journal");
    }

    // ── 10. Spawn the expiry sweeper ────────────────────────
    let sweeper_handle = tokio::spawn(
        Arc::clone(&orchestrator).run_sweeper(shutdown_tx.subscribe()),
    );

    // ── 11. Serve the bot-trading API ───────────────────────
    let api_handle = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let bind = config.api.bind_address.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = api::routes::serve(orchestrator, &bind, shutdown_rx).await {
                error!(error = %e, "API server failed");
            }
        }
    });

    info!("All tasks spawned — orchestrator is running");

    // ── 12. Wait for SIGINT or SIGTERM ──────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown (drain→stop→exit) ─────────────────

    // 1. Mark unready so load balancers stop routing here
    health_state.accepting.store(false, Ordering::Relaxed);

    // 2. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 3. Wait for the API server to drain (up to 30s)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(30), api_handle).await;

    // 4. Wait for the sweeper to stop (up to 5s)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), sweeper_handle).await;

    // 5. Stop metrics + health servers
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }
    health_handle.abort();

    if !store.is_healthy().await {
        warn!("Journal reported unhealthy during shutdown");
    }

    info!("Shutdown complete");
    Ok(())
}
