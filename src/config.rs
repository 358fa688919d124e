//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Bridge server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    // =========================================================================
    // HTTP Server
    // =========================================================================
    /// Port the webhook server listens on (bound on all interfaces)
    #[serde(default = "default_port")]
    pub port: u16,

    // =========================================================================
    // Roman (downstream broadcast API)
    // =========================================================================
    /// Roman base URL, always ending with `/`
    #[serde(default = "default_roman_url")]
    pub roman_url: String,

    /// Optional request timeout for Roman calls; reqwest defaults apply when unset
    #[serde(default)]
    pub roman_timeout_secs: Option<u64>,

    // =========================================================================
    // Tenants & Release
    // =========================================================================
    /// JSON document mapping bearer tokens to `{ admins, appKey }`
    pub auth_configuration_path: PathBuf,

    /// File holding the release version string
    #[serde(default)]
    pub release_file_path: Option<PathBuf>,

    /// Emit log lines as JSON
    #[serde(default)]
    pub json_logs: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_roman_url() -> String {
    "https://roman.integrations.zinfra.io/".to_string()
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let auth_configuration_path = std::env::var("AUTH_CONFIGURATION_PATH")
            .context("AUTH_CONFIGURATION_PATH is required")?;

        let port = parse_var("PORT", std::env::var("PORT").ok())?.unwrap_or_else(default_port);
        let roman_timeout_secs =
            parse_var("ROMAN_TIMEOUT_SECS", std::env::var("ROMAN_TIMEOUT_SECS").ok())?;

        Ok(Self {
            port,
            roman_url: normalize_base_url(
                &std::env::var("ROMAN_URL").unwrap_or_else(|_| default_roman_url()),
            ),
            roman_timeout_secs,
            auth_configuration_path: PathBuf::from(auth_configuration_path),
            release_file_path: std::env::var("RELEASE_FILE_PATH").ok().map(PathBuf::from),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Address the webhook server binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Full URL of Roman's broadcast endpoint
    pub fn broadcast_url(&self) -> String {
        format!("{}broadcast", normalize_base_url(&self.roman_url))
    }
}

/// Parse an optional variable; a set but unparsable value is an error
fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map(|raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("{name} is not valid, got {raw:?}"))
    })
    .transpose()
}

/// Roman URLs are joined by plain concatenation, so the base must end with `/`.
fn normalize_base_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
