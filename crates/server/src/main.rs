//! dakoku - Slack to freee HR attendance relay
//!
//! Binary entry point: loads configuration, wires the token manager, API
//! clients and background jobs, and serves the webhook/admin endpoints.

mod handlers;
mod routes;
mod state;
mod verify;

use std::sync::Arc;

use dakoku_core::{CredentialStore, Notifier};
use dakoku_domain::{DakokuError, Result};
use dakoku_infra::{
    ChannelNotifier, FileCredentialStore, FreeeClient, HealthMonitor, HttpClient,
    RefreshScheduler, SlackClient, TokenManager,
};
use tracing::{info, warn};

use crate::state::AppState;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,dakoku=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!("no .env file found"),
    }

    let config = Arc::new(dakoku_infra::config::load()?);

    let http = HttpClient::builder()
        .user_agent(concat!("dakoku/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(&config.credentials.store_path));
    let tokens = Arc::new(TokenManager::new(store, http.clone(), &config.freee));

    let freee = Arc::new(FreeeClient::new(
        config.freee.api_base_url.clone(),
        http.clone(),
        Arc::clone(&tokens),
    ));
    let slack = Arc::new(SlackClient::new(
        config.slack.api_base_url.clone(),
        config.slack.bot_token.clone(),
        http,
    ));
    let notifier: Arc<dyn Notifier> =
        Arc::new(ChannelNotifier::new(Arc::clone(&slack), config.slack.target_channel.clone()));

    let mut scheduler = if config.scheduler.enabled {
        let mut scheduler = RefreshScheduler::new(
            config.scheduler.refresh_cron.clone(),
            Arc::clone(&tokens),
            Arc::clone(&notifier),
        );
        scheduler.start().await.map_err(DakokuError::from)?;
        Some(scheduler)
    } else {
        info!("refresh scheduler disabled by configuration");
        None
    };

    let mut health = HealthMonitor::new(
        Arc::clone(&freee),
        notifier,
        config.scheduler.health_interval_secs,
    );
    health.start()?;

    let bind_addr = config.server.bind_addr.clone();
    let app = routes::router(AppState::new(config, tokens, freee, slack));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| DakokuError::Config(format!("failed to bind {bind_addr}: {err}")))?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| DakokuError::Internal(format!("server error: {err}")))?;

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(err) = scheduler.stop().await {
            warn!(error = %err, "refresh scheduler did not stop cleanly");
        }
    }
    if let Err(err) = health.stop().await {
        warn!(error = %err, "health monitor did not stop cleanly");
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
