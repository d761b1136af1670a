use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use fleet_tracker::{SessionHandle, SessionPorts};

mod client;
mod models;
mod routes;
mod state;
mod utils;

use crate::client::graphql::GraphqlClient;
use crate::client::live_feed::StreamingLiveFeed;
use crate::state::app_state::AppState;
use crate::state::view_bridge::ViewBridge;
use crate::utils::conf_helper::{config_path, get_cached_config, init_config_and_bind, load_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config(&config_path()).await?;

    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .init();

    let settings = config.session.to_settings()?;
    let timeout = Duration::from_secs(config.backend.timeout_secs);

    let graphql = Arc::new(GraphqlClient::new(
        config.backend.graphql_url.clone(),
        config.backend.auth_token.clone(),
        timeout,
    )?);
    let live = Arc::new(StreamingLiveFeed::new(
        config.backend.live_url.clone(),
        config.backend.auth_token.clone(),
        timeout,
    )?);
    let view = ViewBridge::new();

    let ports = SessionPorts {
        roster: graphql.clone(),
        live,
        history: graphql,
        notifier: Arc::new(view.clone()),
        map: Arc::new(view.clone()),
    };

    // === CONFIG + LISTENER ===
    let listener = init_config_and_bind(config).await?;
    let config = get_cached_config().context("config not initialized")?;

    info!(
        "Server initialized on {}:{}",
        config.connection.ip,
        config.connection.port
    );

    let (session, session_task) = SessionHandle::spawn(ports, settings);
    let state = AppState::new(session.clone(), view);

    let stop = state.shutdown.clone();

    let app = Router::new()
        .merge(routes::info_routes::health_routes(state.clone()))
        .merge(routes::session_routes::session_routes(state.clone()))
        .merge(routes::events_ws::event_routes(state));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = stop.notified() => info!("Stop requested"),
            }
        })
        .await?;

    if let Err(e) = session.shutdown().await {
        warn!("Session already stopped: {}", e);
    }
    session_task.await.context("session task panicked")?;

    Ok(())
}
