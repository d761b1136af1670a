use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::tracker_model::TrackerConfig;

static CONFIG_CACHE: OnceLock<TrackerConfig> = OnceLock::new();

const DEFAULT_CONFIG_PATH: &str = "tracker.json";

pub fn config_path() -> String {
    std::env::var("TRACKER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub async fn load_config(file_path: &str) -> Result<TrackerConfig> {
    let data = fs::read_to_string(file_path)
        .await
        .with_context(|| format!("File read error: {file_path}"))?;

    serde_json::from_str(&data).with_context(|| format!("JSON parse error: {file_path}"))
}

/// Binds the listener, patches a zero port with the one actually assigned and
/// caches the config for the rest of the process.
pub async fn init_config_and_bind(mut config: TrackerConfig) -> Result<TcpListener> {
    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Bind failed: {bind_addr}"))?;

    let actual_port = listener.local_addr().context("Addr error")?.port();
    config.connection.port = actual_port;

    CONFIG_CACHE
        .set(config)
        .map_err(|_| anyhow!("Config already initialized"))?;

    info!("Config initialized with port: {}", actual_port);

    Ok(listener)
}

pub fn get_cached_config() -> Option<&'static TrackerConfig> {
    CONFIG_CACHE.get()
}
