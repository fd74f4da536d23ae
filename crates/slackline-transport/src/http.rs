//! HTTP client for the session bootstrap API.
//!
//! Uses reqwest to call `rtm.connect`, which hands out a WebSocket URL
//! plus identity and team metadata for a new RTM session.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::traits::{ApiError, BootstrapApi};

/// Default Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Bootstrap method name.
pub const RTM_CONNECT_METHOD: &str = "rtm.connect";

/// Fixed bootstrap options: presence changes arrive batched.
const RTM_CONNECT_QUERY: [(&str, &str); 1] = [("batch_presence_aware", "1")];

/// Request timeout for API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed [`BootstrapApi`].
pub struct HttpBootstrapApi {
    client: Client,
    api_base: String,
    token: String,
}

impl HttpBootstrapApi {
    /// Create a new client for `api_base` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Full URL of an API method.
    #[must_use]
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

impl fmt::Debug for HttpBootstrapApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBootstrapApi")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl BootstrapApi for HttpBootstrapApi {
    async fn rtm_connect(&self) -> Result<Value, ApiError> {
        let url = self.method_url(RTM_CONNECT_METHOD);
        debug!(url = %url, "Calling session bootstrap API");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&RTM_CONNECT_QUERY[..])
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Bootstrap request failed");
            return Err(ApiError::Http(format!("HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            warn!(error = %error, "Bootstrap API returned an error");
            return Err(ApiError::Service(error.to_string()));
        }

        Ok(body)
    }
}
