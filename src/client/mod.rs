pub mod graphql;
pub mod live_feed;

use fleet_tracker::TrackerError;
use reqwest::StatusCode;

/// Auth failures are told apart from every other non-success status.
pub fn check_status(status: StatusCode) -> fleet_tracker::Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(TrackerError::Auth(status.to_string()));
    }
    if !status.is_success() {
        return Err(TrackerError::Network(format!("server returned {status}")));
    }
    Ok(())
}
