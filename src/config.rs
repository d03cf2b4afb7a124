//! Client configuration.

use std::time::Duration;

const DEFAULT_WS_URL: &str = "ws://localhost:6001";
const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Sync client configuration.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Push broker WebSocket URL.
    pub ws_url: String,

    /// Application key appended to the broker URL path (`/app/<key>`).
    pub app_key: String,

    /// REST base URL for the backend.
    pub api_url: String,

    /// Per-request timeout for backend calls. A timed-out send is rolled back.
    /// Default: 15s
    pub request_timeout: Duration,

    /// Delay between transport reconnect attempts.
    /// Default: 3s
    pub reconnect_delay: Duration,

    /// Max buffered changes per cache watcher before further ones are coalesced.
    /// Default: 256
    pub watch_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            app_key: "rendezvous".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            reconnect_delay: Duration::from_secs(3),
            watch_buffer: 256,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `RENDEZVOUS_WS_URL`, `RENDEZVOUS_APP_KEY` and
    /// `RENDEZVOUS_API_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("RENDEZVOUS_WS_URL") {
            config.ws_url = url;
        }
        if let Ok(key) = std::env::var("RENDEZVOUS_APP_KEY") {
            config.app_key = key;
        }
        if let Ok(url) = std::env::var("RENDEZVOUS_API_URL") {
            config.api_url = url;
        }
        tracing::debug!(ws_url = %config.ws_url, api_url = %config.api_url, "Loaded sync config");
        config
    }

    /// Full broker endpoint, e.g. `ws://host:6001/app/<key>?protocol=7`.
    pub fn broker_endpoint(&self) -> String {
        format!(
            "{}/app/{}?protocol=7&client=rendezvous",
            self.ws_url.trim_end_matches('/'),
            self.app_key
        )
    }
}
