//! Fetching JSON metadata over HTTP.

mod client;

use anyhow::Result;
use async_trait::async_trait;

pub use client::{HttpClient, build_client};

/// Source of remote repository metadata.
///
/// Implemented by [`HttpClient`]; mocked in tests of the remote repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch and decode a JSON document.
    ///
    /// Returns `Ok(None)` when the server answers 404.
    async fn fetch_json(&self, url: &str) -> Result<Option<serde_json::Value>>;
}
