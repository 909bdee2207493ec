//! Garmin Connect HTTP source
//!
//! Talks to the Connect API with an already-issued bearer token. Obtaining
//! the token is left to the calling environment.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use super::{FetchError, MetricSource};

/// Default Connect API host
pub const DEFAULT_API_BASE: &str = "https://connectapi.garmin.com";

/// Blocking Garmin Connect client
pub struct GarminConnectClient {
    http: Client,
    base_url: String,
    token: String,
    display_name: String,
}

impl GarminConnectClient {
    /// Create a client for the given account display name
    pub fn new(
        token: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("synheart-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            display_name: display_name.into(),
        })
    }

    /// Point the client at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "fetching");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.json()?)
    }
}

impl MetricSource for GarminConnectClient {
    fn daily_stats(&self, date: NaiveDate) -> Result<Value, FetchError> {
        let path = format!(
            "/usersummary-service/usersummary/daily/{}",
            self.display_name
        );
        self.get_json(&path, &[("calendarDate", date.to_string())])
    }

    fn sleep(&self, date: NaiveDate) -> Result<Value, FetchError> {
        let path = format!(
            "/wellness-service/wellness/dailySleepData/{}",
            self.display_name
        );
        self.get_json(
            &path,
            &[
                ("date", date.to_string()),
                ("nonSleepBufferMinutes", "60".to_string()),
            ],
        )
    }

    fn hrv(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(&format!("/hrv-service/hrv/{date}"), &[])
    }

    fn body_battery(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(
            "/wellness-service/wellness/bodyBattery/reports/daily",
            &[("startDate", date.to_string()), ("endDate", date.to_string())],
        )
    }

    fn activities(&self, start: usize, limit: usize) -> Result<Value, FetchError> {
        self.get_json(
            "/activitylist-service/activities/search/activities",
            &[("start", start.to_string()), ("limit", limit.to_string())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GarminConnectClient::new("token", "runner")
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_unreachable_host_is_a_fetch_error() {
        // Port 9 (discard) on localhost is not serving HTTP
        let client = GarminConnectClient::new("token", "runner")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert!(matches!(client.hrv(date), Err(FetchError::Http(_))));
    }
}
