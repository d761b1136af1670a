use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use std::fmt::Display;
use std::time::Duration;
use tracing::{info, warn};

use fleet_tracker::{BatchStream, LiveFeed, LiveRequest, Result, TrackPoint, TrackerError};

use crate::client::check_status;

/// Splits a byte stream into newline-delimited JSON batches.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Vec<TrackPoint>>> {
        self.pending.extend_from_slice(chunk);

        let mut batches = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            batches.push(serde_json::from_str(text).map_err(TrackerError::from));
        }
        batches
    }
}

fn decode_batches<S, B, E>(chunks: S) -> impl Stream<Item = Result<Vec<TrackPoint>>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut lines = LineBuffer::default();
    chunks
        .map(move |chunk| match chunk {
            Ok(bytes) => lines.push(bytes.as_ref()),
            Err(e) => vec![Err(TrackerError::Network(e.to_string()))],
        })
        .flat_map(stream::iter)
}

/// Live positions over a long-lived HTTP response, one JSON array per line.
pub struct StreamingLiveFeed {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl StreamingLiveFeed {
    pub fn new(endpoint: String, auth_token: Option<String>, connect_timeout: Duration) -> Result<Self> {
        // no total timeout: the body stays open for the whole subscription
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TrackerError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            auth_token,
        })
    }
}

#[async_trait]
impl LiveFeed for StreamingLiveFeed {
    async fn subscribe(&self, request: LiveRequest) -> Result<BatchStream> {
        let snap = if request.snap_to_road { "true" } else { "false" };
        let mut http = self
            .client
            .get(&self.endpoint)
            .query(&[("deviceId", request.device_id.as_str()), ("snapToRoad", snap)]);
        if let Some(token) = &self.auth_token {
            http = http.bearer_auth(token);
        }

        let response = http.send().await.map_err(|e| {
            warn!("live subscribe failed: {}", e);
            TrackerError::Network(e.to_string())
        })?;
        check_status(response.status())?;

        info!("live stream open for {}", request.device_id);
        Ok(decode_batches(response.bytes_stream()).boxed())
    }
}
