//! Roman API client
//!
//! Handles:
//! - Broadcast sending (text, attachment and call messages)
//! - Broadcast stats retrieval

use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::wire::WireMessage;

/// Header carrying the tenant's Roman API key
const APP_KEY_HEADER: &str = "app-key";

// =============================================================================
// Errors
// =============================================================================

/// Failure of a call to Roman
#[derive(Debug, thiserror::Error)]
pub enum RomanError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} was not successful ({status})")]
    Unsuccessful {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    #[error("response from {url} could not be parsed: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for Roman calls
pub type RomanResult<T> = Result<T, RomanError>;

// =============================================================================
// Response Types
// =============================================================================

/// Response to a broadcast request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReceipt {
    /// Roman omits the id for call signals
    #[serde(default)]
    pub broadcast_id: Option<String>,
}

/// Broadcast delivery report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatsReport {
    pub report: Vec<StatsEntry>,
}

/// Number of deliveries in one state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatsEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

impl StatsReport {
    /// One `"<type>: <count>"` line per entry, in Roman's order
    pub fn render(&self) -> String {
        self.report
            .iter()
            .map(|entry| format!("{}: {}", entry.kind, entry.count))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Roman Client
// =============================================================================

/// Client for Roman's broadcast endpoint
#[derive(Clone)]
pub struct RomanClient {
    broadcast_url: String,
    http_client: Client,
}

impl RomanClient {
    /// Create a client for the given broadcast endpoint URL
    pub fn new(broadcast_url: impl Into<String>) -> Self {
        Self::with_http_client(broadcast_url, Client::new())
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(broadcast_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(broadcast_url, http_client))
    }

    fn with_http_client(broadcast_url: impl Into<String>, http_client: Client) -> Self {
        Self {
            broadcast_url: broadcast_url.into(),
            http_client,
        }
    }

    /// Broadcast a message to all subscribers of the tenant's channel
    pub async fn broadcast(&self, message: &WireMessage, app_key: &str) -> RomanResult<BroadcastReceipt> {
        debug!("Sending {} broadcast to Roman", message.kind());

        let request = self
            .http_client
            .post(&self.broadcast_url)
            .header(APP_KEY_HEADER, app_key)
            .json(message);

        self.execute(Method::POST, request).await
    }

    /// Fetch stats of one broadcast, or Roman's default report when no id is given
    pub async fn stats(&self, app_key: &str, broadcast_id: Option<&str>) -> RomanResult<StatsReport> {
        debug!(broadcast_id, "Retrieving broadcast stats");

        let mut request = self
            .http_client
            .get(&self.broadcast_url)
            .header(APP_KEY_HEADER, app_key);
        if let Some(id) = broadcast_id {
            request = request.query(&[("id", id)]);
        }

        self.execute(Method::GET, request).await
    }

    /// Send the request and parse a JSON body, logging anything unsuccessful
    async fn execute<T: DeserializeOwned>(&self, method: Method, request: RequestBuilder) -> RomanResult<T> {
        let response = request.send().await.map_err(|source| {
            warn!(http_method = %method, http_url = %self.broadcast_url, "Request to Roman failed: {}", source);
            RomanError::Transport {
                url: self.broadcast_url.clone(),
                source,
            }
        })?;

        let url = response.url().to_string();
        let status = response.status();
        let body = response.text().await.map_err(|source| RomanError::Transport {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            warn!(
                http_method = %method,
                http_url = %url,
                http_status = status.as_u16(),
                http_body = %body,
                "Request was not successful!"
            );
            return Err(RomanError::Unsuccessful {
                method,
                url,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| {
            warn!(
                http_method = %method,
                http_url = %url,
                http_status = status.as_u16(),
                http_body = %body,
                "Roman response could not be parsed"
            );
            RomanError::Parse { url, source }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
