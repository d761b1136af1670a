use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use fleet_tracker::{
    Device, HistoryRequest, HistorySource, ReplayHistory, Result, RosterSource, TrackerError,
};

use crate::client::check_status;

const ROSTER_QUERY: &str = "query DeviceRoster {
  getAllDeviceLocations {
    uniqueId vehicleType latitude longitude speed timestamp
    haltStatus idlingStatus isNoGps isPrimaryBattery address
  }
}";

const HISTORY_QUERY: &str = "query DeviceTrack($uniqueId: String!, $from: String!, $to: String!) {
  getDeviceTrack(uniqueId: $uniqueId, from: $from, to: $to) {
    distanceTravelledKms
    points { lat lng ts speed address isHA isHB }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterData {
    get_all_device_locations: Option<Vec<Device>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackData {
    get_device_track: Option<ReplayHistory>,
}

fn unwrap_envelope<T>(body: GraphqlResponse<T>) -> Result<T> {
    if !body.errors.is_empty() {
        let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
        return Err(TrackerError::Backend(messages.join("; ")));
    }
    body.data
        .ok_or_else(|| TrackerError::EmptyResult("response carried no data".to_string()))
}

/// Roster and history queries against the tenant's GraphQL endpoint.
pub struct GraphqlClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl GraphqlClient {
    pub fn new(endpoint: String, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            auth_token,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::Network(e.to_string()))?;
        check_status(response.status())?;

        let body: GraphqlResponse<T> = response
            .json()
            .await
            .map_err(|e| TrackerError::Decode(e.to_string()))?;
        unwrap_envelope(body)
    }
}

#[async_trait]
impl RosterSource for GraphqlClient {
    async fn fetch_roster(&self) -> Result<Vec<Device>> {
        let data: RosterData = self.execute(ROSTER_QUERY, json!({})).await?;
        let devices = data
            .get_all_device_locations
            .ok_or_else(|| TrackerError::EmptyResult("no roster".to_string()))?;
        debug!("roster fetched: {} devices", devices.len());
        Ok(devices)
    }
}

#[async_trait]
impl HistorySource for GraphqlClient {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<ReplayHistory> {
        let variables = serde_json::to_value(request)?;
        let data: TrackData = self.execute(HISTORY_QUERY, variables).await?;
        data.get_device_track
            .ok_or_else(|| TrackerError::EmptyResult(format!("no track for {}", request.unique_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_errors() {
        let body: GraphqlResponse<RosterData> = serde_json::from_str(
            r#"{"data": null, "errors": [{"message": "token expired"}, {"message": "again"}]}"#,
        )
        .unwrap();
        match unwrap_envelope(body) {
            Err(TrackerError::Backend(msg)) => assert_eq!(msg, "token expired; again"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_envelope_without_data() {
        let body: GraphqlResponse<RosterData> = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(unwrap_envelope(body), Err(TrackerError::EmptyResult(_))));
    }

    #[test]
    fn test_roster_payload() {
        let body: GraphqlResponse<RosterData> = serde_json::from_str(
            r#"{"data": {"getAllDeviceLocations": [
                {"uniqueId": "v1", "latitude": 1.0, "longitude": 2.0, "timestamp": null}
            ]}}"#,
        )
        .unwrap();
        let data = unwrap_envelope(body).unwrap();
        let devices = data.get_all_device_locations.unwrap();
        assert_eq!(devices[0].unique_id, "v1");
        assert!(devices[0].has_no_data());
    }

    #[test]
    fn test_history_variables_are_strings() {
        let request = HistoryRequest::new("v1", 1_700_000_000, 1_700_003_600);
        let variables = serde_json::to_value(&request).unwrap();
        assert_eq!(variables["uniqueId"], json!("v1"));
        assert_eq!(variables["from"], json!("1700000000"));
        assert_eq!(variables["to"], json!("1700003600"));
    }
}
