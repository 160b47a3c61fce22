mod aggregate;
mod api;
mod config;
mod error;
mod github;
mod github_types;
mod models;
mod monitor;
mod reconcile;
mod registry;
mod state;
mod store;

use crate::config::Config;
use crate::github::GithubClient;
use crate::reconcile::Reconciler;
use crate::registry::RepositoryRegistry;
use crate::state::AppState;
use crate::store::RecordStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load Config
    let config = Config::new().expect("Failed to load config");
    let config = Arc::new(config);

    let registry = RepositoryRegistry::from_config(&config.repositories)
        .expect("Invalid repository configuration");
    info!(
        "Tracking {} repositories (default {})",
        registry.repositories().len(),
        config.repositories.default
    );

    let github_client = GithubClient::new(&config.github).expect("Failed to create GitHub client");
    if config.github.token.is_none() {
        tracing::warn!("No GitHub token configured; unauthenticated requests are heavily rate limited");
    }

    // The store lives for the whole process; nothing survives a restart.
    let store = Arc::new(RecordStore::new());

    let ttl = config.poller.details_ttl_seconds.unwrap_or(600);
    let capacity = config.poller.details_capacity.unwrap_or(1_000);
    let reconciler = Reconciler::new(
        store,
        Arc::new(github_client),
        config.github.pages_environment.clone(),
        Duration::from_secs(ttl),
        capacity,
    );

    let state = AppState {
        reconciler: Arc::new(reconciler),
        registry: Arc::new(registry),
        refresh_notify: Arc::new(tokio::sync::Notify::new()),
        periodic_refresh: config.poller.interval_seconds > 0,
    };

    // Start periodic refresher in background
    if state.periodic_refresh {
        let monitor_state = state.clone();
        let interval = Duration::from_secs(config.poller.interval_seconds);
        tokio::spawn(async move {
            monitor::start_monitor_loop(monitor_state, interval).await;
        });
    } else {
        info!("Periodic refresh disabled; data is fetched on demand");
    }

    // Start Web Server
    let app = api::app_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
