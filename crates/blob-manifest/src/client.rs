//! Cache-validator-aware HTTP client

use crate::error::{ManifestError, Result};
use bytes::Bytes;
use reqwest::{header, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Outcome of one conditional fetch
pub enum ConditionalFetch {
    /// The resource changed; new validator and full body
    Changed { validator: String, body: Bytes },
    /// Validator matches the last known one (or the endpoint sends none);
    /// nothing was transferred
    Unchanged,
}

/// HTTP client performing validator-gated fetches against object storage
///
/// Each fetch is a HEAD first; the body is only transferred when the ETag
/// differs from the caller's last known validator.
pub struct ConditionalClient {
    http: reqwest::Client,
}

impl ConditionalClient {
    /// Create a client with default settings (30 second timeout)
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a client with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// HEAD `url` and GET it only when its validator differs from `known`
    ///
    /// A 404 on either request is reported as [`ManifestError::NotFound`]
    /// so callers can distinguish a deleted resource from a transient
    /// failure.
    pub async fn fetch_if_changed(
        &self,
        url: &str,
        known: Option<&str>,
    ) -> Result<ConditionalFetch> {
        let head = self.http.head(url).send().await?;
        if head.status() == StatusCode::NOT_FOUND {
            return Err(ManifestError::NotFound);
        }
        if !head.status().is_success() {
            return Err(ManifestError::Status(head.status()));
        }

        let validator = match etag_of(&head) {
            Some(validator) if known != Some(validator.as_str()) => validator,
            _ => {
                debug!(url = %url, "validator unchanged, skipping fetch");
                return Ok(ConditionalFetch::Unchanged);
            }
        };

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ManifestError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ManifestError::Status(response.status()));
        }

        // prefer the GET's validator: it matches the body actually received
        let validator = etag_of(&response).unwrap_or(validator);
        let body = response.bytes().await?;
        debug!(url = %url, size = body.len(), "fetched changed resource");

        Ok(ConditionalFetch::Changed { validator, body })
    }
}

impl Default for ConditionalClient {
    fn default() -> Self {
        Self::new()
    }
}

fn etag_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
