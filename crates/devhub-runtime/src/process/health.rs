//! HTTP health probe for supervised services.

use std::time::Duration;

use async_trait::async_trait;
use devhub_core::HealthProbe;
use reqwest::{Client, StatusCode};
use tracing::debug;

/// Probe that GETs a local URL and treats 200 or 401 as "up".
///
/// 401 counts because it proves the service is listening and enforcing
/// auth, which is all readiness needs to know.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    url: String,
    client: Client,
}

impl HttpHealthProbe {
    /// Probe an arbitrary URL.
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(2)).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Probe `http://127.0.0.1:<port>/`.
    pub fn for_port(port: u16) -> reqwest::Result<Self> {
        Self::new(format!("http://127.0.0.1:{port}/"))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn is_up(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status();
                let up = status == StatusCode::OK || status == StatusCode::UNAUTHORIZED;
                if !up {
                    debug!(url = %self.url, %status, "Health probe returned unexpected status");
                }
                up
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Health probe failed");
                false
            }
        }
    }
}
