//! Access-control API client.

use async_trait::async_trait;
use gatewatch_core::config::AccessConfig;
use gatewatch_core::error::{GatewatchError, Result};
use gatewatch_core::traits::AccessSource;
use gatewatch_core::types::AccessEvent;
use serde::Deserialize;

/// Response envelope of `/api/access/recently`. A missing or `null` `data`
/// means no recent access.
#[derive(Debug, Deserialize)]
struct RecentlyResponse {
    #[serde(default)]
    data: Option<Vec<AccessEvent>>,
}

/// Polls `GET {base_url}/api/access/recently`.
pub struct HttpAccessSource {
    url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl HttpAccessSource {
    pub fn new(config: &AccessConfig) -> Result<Self> {
        Ok(Self {
            url: crate::join_url(&config.base_url, "api/access/recently"),
            auth_token: config.auth_token.clone(),
            client: crate::build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AccessSource for HttpAccessSource {
    async fn fetch_recent(&self) -> Result<Vec<AccessEvent>> {
        let response = self
            .client
            .get(&self.url)
            .header("X-Auth-Token", &self.auth_token)
            .send()
            .await
            .map_err(|e| GatewatchError::access(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewatchError::access(format!(
                "error fetching recent access: {status} {body}"
            )));
        }

        let parsed: RecentlyResponse = response
            .json()
            .await
            .map_err(|e| GatewatchError::access(format!("invalid response: {e}")))?;

        let events = parsed.data.unwrap_or_default();
        tracing::debug!("📥 Access batch: {} events", events.len());
        Ok(events)
    }
}
