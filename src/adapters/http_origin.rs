//! HTTP Origin Adapter
//!
//! Implements the `OriginFetcher` port against an HTTP service that answers
//! `GET {base_url}/{key}` with a JSON document.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::OriginFetcher;
use crate::error::{Error, Result};

/// HTTP origin settings
#[derive(Debug, Clone)]
pub struct HttpOriginConfig {
    /// Base URL; the percent-encoded key is appended as the last segment
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpOriginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000/items".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Origin backed by a remote HTTP API
pub struct HttpOrigin {
    config: HttpOriginConfig,
    client: Client,
}

impl HttpOrigin {
    pub fn new(config: HttpOriginConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl OriginFetcher for HttpOrigin {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<Value> {
        let url = self.url_for(key);
        debug!(%url, "Fetching from origin");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::origin(key, e))?;

        match response.status() {
            status if status.is_success() => {
                response.json::<Value>().await.map_err(|e| Error::origin(key, e))
            }
            StatusCode::NOT_FOUND => Err(Error::origin(key, "not found")),
            status => Err(Error::origin(key, format!("origin returned {}", status))),
        }
    }

    fn origin_name(&self) -> &'static str {
        "http"
    }
}
