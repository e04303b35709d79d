//! Per-blob fetch state

use crate::client::{ConditionalClient, ConditionalFetch};
use crate::error::ManifestError;
use async_trait::async_trait;
use bytes::Bytes;
use refreshable_cache::{ContentSource, ContentStream, StreamError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Default)]
struct LeafState {
    validator: Option<String>,
    content: Option<Bytes>,
    valid: bool,
}

/// One blob named by the manifest
///
/// Holds the blob's URL plus its last-known validator and body. Leaves are
/// retained across refresh cycles precisely so this state survives: an
/// unchanged blob costs a single HEAD on the next cycle.
pub struct Leaf {
    url: String,
    state: RwLock<LeafState>,
}

impl Leaf {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: RwLock::new(LeafState::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Conditionally re-fetch this blob, absorbing per-leaf failures
    ///
    /// A missing blob (404) invalidates the leaf and drops its content so
    /// stale bytes are never served; its validator is dropped too, so a
    /// blob that reappears is fetched fresh. Any other failure keeps the
    /// last known state and is only logged.
    pub async fn refresh(&self, client: &ConditionalClient) {
        let known = self.state.read().await.validator.clone();
        match client.fetch_if_changed(&self.url, known.as_deref()).await {
            Ok(ConditionalFetch::Changed { validator, body }) => {
                debug!(url = %self.url, size = body.len(), "blob updated");
                let mut state = self.state.write().await;
                state.validator = Some(validator);
                state.content = Some(body);
                state.valid = true;
            }
            Ok(ConditionalFetch::Unchanged) => {}
            Err(ManifestError::NotFound) => {
                warn!(url = %self.url, "blob missing, marking invalid");
                let mut state = self.state.write().await;
                state.validator = None;
                state.content = None;
                state.valid = false;
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "blob fetch failed, keeping last known state");
            }
        }
    }

    /// Whether this leaf currently has servable content
    pub async fn is_valid(&self) -> bool {
        let state = self.state.read().await;
        state.valid && state.content.is_some()
    }
}

#[async_trait]
impl ContentSource for Leaf {
    async fn open(&self) -> Result<ContentStream, StreamError> {
        let state = self.state.read().await;
        match (&state.content, state.valid) {
            (Some(content), true) => Ok(ContentStream::Bytes(content.clone())),
            _ => Err(StreamError::SourceUnavailable(self.url.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_leaf_is_invalid_and_unservable() {
        let leaf = Leaf::new("http://storage.example/container/pkg/v1");
        assert!(!leaf.is_valid().await);
        assert!(matches!(
            leaf.open().await,
            Err(StreamError::SourceUnavailable(_))
        ));
    }
}
