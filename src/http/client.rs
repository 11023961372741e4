//! HTTP client for repository metadata.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};

use super::MetadataFetcher;
use crate::runtime::Runtime;

/// Environment variable holding a bearer token for private repositories.
pub const TOKEN_ENV: &str = "PKGQUERY_TOKEN";

/// Build the reqwest client used for every metadata request.
pub fn build_client<R: Runtime + ?Sized>(runtime: &R) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Ok(token) = runtime.env_var(TOKEN_ENV) {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("PKGQUERY_TOKEN is not a valid header value")?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("Using {} for repository authentication", TOKEN_ENV);
    }

    Client::builder()
        .user_agent("pkgquery-cli")
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

/// Thin wrapper over a reqwest [`Client`]. Failures are not retried.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataFetcher for HttpClient {
    #[tracing::instrument(skip(self))]
    async fn fetch_json(&self, url: &str) -> Result<Option<serde_json::Value>> {
        debug!("GET JSON from {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("{} not found", url);
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .with_context(|| format!("Request to {} failed", url))?;

        let value = response
            .json::<serde_json::Value>()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))?;

        Ok(Some(value))
    }
}
