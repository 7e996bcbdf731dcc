//! Reachability probes
//!
//! A probe is a lightweight check against a live endpoint, as opposed to
//! a control-plane query through a provider.

use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_INTERNET_CHECK_URL: &str = "https://www.google.com";

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe for the coordinator's service endpoint
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    /// Whether the service at `url` answers
    async fn service_available(&self, url: &str) -> bool;
}

/// HTTP probe: any 2xx or 3xx answer within the timeout counts as available
#[derive(Debug, Clone)]
pub struct HttpServiceProbe {
    client: reqwest::Client,
}

impl HttpServiceProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET `url` and report whether it answered successfully
    pub async fn reachable(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                tracing::debug!(url, %status, "probe answered");
                status.is_success() || status.is_redirection()
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "probe failed");
                false
            }
        }
    }
}

impl Default for HttpServiceProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl ServiceProbe for HttpServiceProbe {
    async fn service_available(&self, url: &str) -> bool {
        self.reachable(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unroutable_url_is_unavailable() {
        let probe = HttpServiceProbe::new(Duration::from_millis(200));
        assert!(!probe.service_available("http://127.0.0.1:1/").await);
    }

    #[tokio::test]
    async fn test_malformed_url_is_unavailable() {
        let probe = HttpServiceProbe::default();
        assert!(!probe.reachable("not a url").await);
    }
}
