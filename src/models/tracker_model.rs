use serde::{Deserialize, Serialize};
use std::time::Duration;

use fleet_tracker::{SessionSettings, SpeedFactor, TrackerError};
use fleet_tracker::core::constants::*;

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub name: String,
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub connection: Connection,
    pub backend: Backend,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Backend {
    pub graphql_url: String,
    pub live_url: String,
    // never echoed back by /info
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub roster_poll_interval_ms: u64,
    pub offline_threshold_secs: i64,
    pub live_window_ms: u64,
    pub replay_base_interval_ms: u64,
    pub live_zoom: u8,
    pub snap_to_road: bool,
    pub replay_speed: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            roster_poll_interval_ms: ROSTER_POLL_INTERVAL.as_millis() as u64,
            offline_threshold_secs: OFFLINE_THRESHOLD_SECS,
            live_window_ms: LIVE_BATCH_WINDOW.as_millis() as u64,
            replay_base_interval_ms: REPLAY_BASE_INTERVAL.as_millis() as u64,
            live_zoom: LIVE_ZOOM,
            snap_to_road: false,
            replay_speed: 1,
        }
    }
}

fn non_zero_millis(field: &str, ms: u64) -> fleet_tracker::Result<Duration> {
    if ms == 0 {
        return Err(TrackerError::InvalidConfig(format!("session.{field} must be > 0")));
    }
    Ok(Duration::from_millis(ms))
}

impl SessionConfig {
    pub fn to_settings(&self) -> fleet_tracker::Result<SessionSettings> {
        Ok(SessionSettings {
            roster_poll_interval: non_zero_millis("roster_poll_interval_ms", self.roster_poll_interval_ms)?,
            offline_threshold_secs: self.offline_threshold_secs,
            live_window: non_zero_millis("live_window_ms", self.live_window_ms)?,
            replay_base_interval: non_zero_millis("replay_base_interval_ms", self.replay_base_interval_ms)?,
            live_zoom: self.live_zoom,
            snap_to_road: self.snap_to_road,
            replay_speed: SpeedFactor::new(self.replay_speed)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let json = r#"{
            "name": "Fleet Tracker",
            "id": "fleet-tracker",
            "version": "0.2.0",
            "connection": { "ip": "127.0.0.1", "port": 0 },
            "backend": {
                "graphql_url": "http://localhost:4000/graphql",
                "live_url": "http://localhost:4000/live"
            }
        }"#;
        let config: TrackerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend.timeout_secs, 15);
        assert_eq!(config.logging.level, "info");

        let settings = config.session.to_settings().unwrap();
        assert_eq!(settings.roster_poll_interval, Duration::from_millis(10_000));
        assert_eq!(settings.live_zoom, 16);
    }

    #[test]
    fn test_zero_speed_rejected() {
        let session = SessionConfig {
            replay_speed: 0,
            ..SessionConfig::default()
        };
        assert!(session.to_settings().is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let poll = SessionConfig {
            roster_poll_interval_ms: 0,
            ..SessionConfig::default()
        };
        match poll.to_settings() {
            Err(TrackerError::InvalidConfig(msg)) => assert!(msg.contains("roster_poll_interval_ms")),
            other => panic!("unexpected {other:?}"),
        }

        let replay = SessionConfig {
            replay_base_interval_ms: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(replay.to_settings(), Err(TrackerError::InvalidConfig(_))));

        let live = SessionConfig {
            live_window_ms: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(live.to_settings(), Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_token_not_serialized() {
        let backend = Backend {
            graphql_url: "g".into(),
            live_url: "l".into(),
            auth_token: Some("secret".into()),
            timeout_secs: 5,
        };
        let out = serde_json::to_string(&backend).unwrap();
        assert!(!out.contains("secret"));
    }
}
