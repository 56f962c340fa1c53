//! Fleet backend API client.
//!
//! All endpoints are authenticated with `Authorization: Token <key>`.
//! Failures are reported as typed errors and absorbed by the calling
//! loop; nothing here retries.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::presence::PresenceRecord;
use crate::providers::gps::Fix;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

/// A station returned by the nearby lookup, with the backend-estimated
/// arrival time in minutes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NearbyStation {
    pub id: String,
    pub eta: f64,
}

#[derive(Debug, Serialize)]
struct LocationUpdate<'a> {
    bus_id: &'a str,
    #[serde(flatten)]
    fix: &'a Fix,
}

#[derive(Debug, Serialize)]
struct StationUpdate<'a> {
    station_id: &'a str,
    bus_data: &'a [PresenceRecord],
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Report the bus position to the backend.
    pub async fn update_location(&self, bus_id: &str, fix: &Fix) -> Result<(), BackendError> {
        let url = format!("{}/api/bus/location/update/", self.base_url);
        let body = LocationUpdate { bus_id, fix };

        let response = match self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Err(BackendError::NetworkError(e.to_string())),
        };

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }

    /// Look up stations within `radius_km` of a position.
    pub async fn nearby_stations(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyStation>, BackendError> {
        let url = format!(
            "{}/api/stations/nearby/?latitude={}&longitude={}&radius={}",
            self.base_url, latitude, longitude, radius_km
        );

        let response = match self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Err(BackendError::NetworkError(e.to_string())),
        };

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Err(BackendError::NetworkError(e.to_string())),
        };

        serde_json::from_str(&body).map_err(|e| BackendError::ParseError(e.to_string()))
    }

    /// Push a station's aggregated arrival board to the backend.
    pub async fn update_station(
        &self,
        station_id: &str,
        bus_data: &[PresenceRecord],
    ) -> Result<(), BackendError> {
        let url = format!("{}/api/station/update/", self.base_url);
        let body = StationUpdate {
            station_id,
            bus_data,
        };

        let response = match self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Err(BackendError::NetworkError(e.to_string())),
        };

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fix() -> Fix {
        Fix {
            latitude: 37.77,
            longitude: -122.41,
            speed: 32.5,
            heading: 180.0,
            timestamp: 1_700_000_000,
            synthetic: false,
        }
    }

    #[test]
    fn location_update_body_is_flat() {
        let fix = make_fix();
        let body = LocationUpdate {
            bus_id: "7",
            fix: &fix,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["bus_id"], "7");
        assert_eq!(value["latitude"], 37.77);
        assert_eq!(value["longitude"], -122.41);
        assert_eq!(value["speed"], 32.5);
        assert_eq!(value["heading"], 180.0);
        assert_eq!(value["timestamp"], 1_700_000_000_i64);
        assert!(value.get("fix").is_none());
    }

    #[test]
    fn station_update_body_shape() {
        let records = vec![
            PresenceRecord {
                bus_id: "7".to_string(),
                eta: 3.5,
                last_seen: 1_700_000_000,
            },
            PresenceRecord {
                bus_id: "12".to_string(),
                eta: 8.0,
                last_seen: 1_700_000_010,
            },
        ];
        let body = StationUpdate {
            station_id: "S1",
            bus_data: &records,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["station_id"], "S1");
        assert_eq!(value["bus_data"].as_array().unwrap().len(), 2);
        assert_eq!(value["bus_data"][0]["bus_id"], "7");
        assert_eq!(value["bus_data"][0]["eta"], 3.5);
        assert_eq!(value["bus_data"][1]["last_seen"], 1_700_000_010_i64);
    }

    #[test]
    fn nearby_stations_parse() {
        let body = r#"[{"id":"S1","eta":2.0},{"id":"S2","eta":6.5}]"#;
        let stations: Vec<NearbyStation> = serde_json::from_str(body).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "S1");
        assert_eq!(stations[0].eta, 2.0);
        assert_eq!(stations[1].eta, 6.5);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/", "key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
