//! Real-time store client.
//!
//! The store exposes Firebase-RTDB-style REST semantics: writing JSON
//! value `v` to key path `p` is `PUT {base}/{p}.json` with `v` as the
//! body. Writes are last-write-wins; there is nothing to read back.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Store error: {0}")]
    StoreError(String),
}

#[derive(Clone)]
pub struct RealtimeClient {
    client: Client,
    base_url: String,
}

impl RealtimeClient {
    pub fn new(base_url: &str) -> Result<Self, RealtimeError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                RealtimeError::NetworkError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Set the value at a key path, replacing whatever was there.
    pub async fn set<T: Serialize>(&self, path: &str, value: &T) -> Result<(), RealtimeError> {
        let url = format!("{}/{}.json", self.base_url, path);

        let response = match self.client.put(&url).json(value).send().await {
            Ok(resp) => resp,
            Err(e) => return Err(RealtimeError::NetworkError(e.to_string())),
        };

        if !response.status().is_success() {
            return Err(RealtimeError::StoreError(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}
