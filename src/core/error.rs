// Error handling for the tracking core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized: {0}")]
    Auth(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Invalid interval: from {from} is not before to {to}")]
    InvalidInterval { from: i64, to: i64 },

    #[error("Invalid speed factor: {0}")]
    InvalidSpeed(u32),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("No device selected")]
    NoDeviceSelected,

    #[error("Tracking session stopped")]
    ControllerStopped,
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Decode(e.to_string())
    }
}
