//! HTTP requests against the signal controller
//!
//! Every request is keyed by an intersection identifier passed as the
//! `intersection` query parameter.

use log::debug;
use reqwest::{Client, Url};
use std::time::Duration;

use super::error::SyncError;
use super::protocol::{decode_state_response, DemandReport, SensorReport};
use crate::simulation::PhaseSnapshot;

pub const STATE_PATH: &str = "state";
pub const TRAFFIC_PATH: &str = "traffic";
pub const SENSOR_PATH: &str = "sensor";
pub const RESET_PATH: &str = "reset";
pub const HEALTH_PATH: &str = "health";
pub const STREAM_PATH: &str = "ws";

/// Thin request layer over one controller base address
#[derive(Debug, Clone)]
pub struct ControllerClient {
    http: Client,
    base: Url,
}

impl ControllerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let base = parse_base(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str, intersection: Option<&str>) -> Result<Url, SyncError> {
        let mut url = self.base.join(path).map_err(|e| SyncError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            detail: e.to_string(),
        })?;
        if let Some(id) = intersection {
            url.query_pairs_mut().append_pair("intersection", id);
        }
        Ok(url)
    }

    /// Streaming endpoint with the scheme switched to ws/wss
    pub fn stream_url(&self, intersection: &str) -> Result<Url, SyncError> {
        let mut url = self.endpoint(STREAM_PATH, Some(intersection))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|_| SyncError::InvalidUrl {
            url: url.to_string(),
            detail: format!("cannot switch scheme to {scheme}"),
        })?;
        Ok(url)
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<String, SyncError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Fetch the current phase snapshot
    pub async fn fetch_state(&self, intersection: &str) -> Result<PhaseSnapshot, SyncError> {
        let url = self.endpoint(STATE_PATH, Some(intersection))?;
        let response = self.http.get(url).send().await?;
        let body = Self::check(STATE_PATH, response).await?;
        Ok(decode_state_response(&body)?)
    }

    pub async fn send_demand(
        &self,
        intersection: &str,
        report: &DemandReport,
    ) -> Result<(), SyncError> {
        let url = self.endpoint(TRAFFIC_PATH, Some(intersection))?;
        let response = self.http.post(url).json(report).send().await?;
        Self::check(TRAFFIC_PATH, response).await?;
        debug!("Demand report accepted for {}", intersection);
        Ok(())
    }

    pub async fn send_sensor(
        &self,
        intersection: &str,
        report: &SensorReport,
    ) -> Result<(), SyncError> {
        let url = self.endpoint(SENSOR_PATH, Some(intersection))?;
        let response = self.http.post(url).json(report).send().await?;
        Self::check(SENSOR_PATH, response).await?;
        Ok(())
    }

    pub async fn reset(&self, intersection: &str) -> Result<(), SyncError> {
        let url = self.endpoint(RESET_PATH, Some(intersection))?;
        let response = self.http.post(url).send().await?;
        Self::check(RESET_PATH, response).await?;
        Ok(())
    }

    /// Returns the health endpoint's body
    pub async fn health(&self) -> Result<String, SyncError> {
        let url = self.endpoint(HEALTH_PATH, None)?;
        let response = self.http.get(url).send().await?;
        Self::check(HEALTH_PATH, response).await
    }
}

/// Parse a base address, making sure relative joins keep its path
fn parse_base(base_url: &str) -> Result<Url, SyncError> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|e| SyncError::InvalidUrl {
        url: base_url.to_string(),
        detail: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl {
            url: base_url.to_string(),
            detail: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ControllerClient {
        ControllerClient::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoints_carry_intersection() {
        let c = client("http://localhost:8000");
        let url = c.endpoint(STATE_PATH, Some("main")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/state?intersection=main");
    }

    #[test]
    fn test_base_path_is_preserved() {
        let c = client("http://localhost:8000/api");
        let url = c.endpoint(TRAFFIC_PATH, Some("5th & main")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/traffic?intersection=5th+%26+main"
        );
    }

    #[test]
    fn test_stream_url_switches_scheme() {
        assert_eq!(
            client("http://localhost:8000").stream_url("main").unwrap().as_str(),
            "ws://localhost:8000/ws?intersection=main"
        );
        assert_eq!(
            client("https://signals.example.com").stream_url("a").unwrap().as_str(),
            "wss://signals.example.com/ws?intersection=a"
        );
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(ControllerClient::new("ftp://x", Duration::from_secs(1)).is_err());
        assert!(ControllerClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
