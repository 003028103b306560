//! merge-chain-gateway server entry point.
//!
//! Starts the poll loop and the Axum HTTP server with REST and WebSocket
//! endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use merge_chain_gateway::api;
use merge_chain_gateway::app_state::AppState;
use merge_chain_gateway::chain::SuiRpcClient;
use merge_chain_gateway::config::GatewayConfig;
use merge_chain_gateway::domain::{EventBus, SnapshotStore};
use merge_chain_gateway::service::ReconstructionEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, rpc = %config.rpc_url, "starting merge-chain-gateway");

    if let Err(e) = config.chain.validate() {
        tracing::warn!(error = %e, "chain configuration incomplete; affected passes will fail");
    }

    // Chain access
    let client = Arc::new(
        SuiRpcClient::new(&config.rpc_url, Duration::from_secs(config.rpc_timeout_secs))
            .context("building rpc client")?,
    );

    // Engine, store, scheduler
    let engine = Arc::new(ReconstructionEngine::new(
        Arc::clone(&client) as _,
        client as _,
        config.chain.clone(),
        config.engine.clone(),
    ));
    let store = Arc::new(
        SnapshotStore::new(config.tracked_owners.iter().cloned())
            .with_owner_limit(config.owner_retention.max_owners),
    );
    let event_bus = EventBus::new(config.event_bus_capacity);
    let app_state = AppState::new(engine, store, event_bus);

    let poller = tokio::spawn(Arc::clone(&app_state.scheduler).run(
        Duration::from_secs(config.poll_interval_secs.max(1)),
        config.owner_retention.idle_polls,
    ));

    // Start server
    let app = api::build_app(app_state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let served = axum::serve(listener, app).await;
    poller.abort();
    served.context("serving http")?;

    Ok(())
}
