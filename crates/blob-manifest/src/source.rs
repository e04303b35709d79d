//! Manifest snapshot source

use crate::client::{ConditionalClient, ConditionalFetch};
use crate::error::{ManifestError, Result};
use crate::leaf::Leaf;
use crate::manifest::collect_leaves;
use async_trait::async_trait;
use futures::future::join_all;
use refreshable_cache::{ContentRef, ContentSource, Snapshot, SnapshotSource, SourceError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

#[derive(Default)]
struct SourceState {
    manifest_validator: Option<String>,
    /// every leaf fetcher ever constructed, keyed by exact composed path;
    /// kept so validator state survives manifest changes
    history: HashMap<String, Arc<Leaf>>,
    /// the current manifest's leaves, in manifest order
    roster: Vec<(String, Arc<Leaf>)>,
}

/// Snapshot source backed by a remote manifest of blobs
///
/// The manifest URL's final path segment is the manifest object itself;
/// everything before it is the base the composed leaf paths are appended
/// to. One `produce` call is one refresh cycle: conditional manifest
/// fetch, then a concurrent conditional fetch of every leaf. The snapshot
/// is only returned once all leaf fetches complete, so a partially
/// refreshed roster is never exposed.
pub struct ManifestSource {
    manifest_url: String,
    base_url: String,
    client: ConditionalClient,
    inner: Mutex<SourceState>,
}

impl ManifestSource {
    pub fn new(manifest_url: impl Into<String>) -> Result<Self> {
        let manifest_url = manifest_url.into();
        let parsed = Url::parse(&manifest_url)
            .map_err(|e| ManifestError::BadUrl(format!("{}: {}", manifest_url, e)))?;
        if parsed.path().trim_start_matches('/').is_empty() {
            return Err(ManifestError::BadUrl(format!(
                "{}: no manifest path",
                manifest_url
            )));
        }
        let base_url = match manifest_url.rfind('/') {
            Some(pos) => manifest_url[..pos].to_string(),
            None => return Err(ManifestError::BadUrl(manifest_url)),
        };
        Ok(Self {
            manifest_url,
            base_url,
            client: ConditionalClient::new(),
            inner: Mutex::new(SourceState::default()),
        })
    }

    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }
}

#[async_trait]
impl SnapshotSource for ManifestSource {
    async fn produce(&self) -> std::result::Result<Snapshot, SourceError> {
        let mut inner = self.inner.lock().await;

        let known = inner.manifest_validator.clone();
        match self
            .client
            .fetch_if_changed(&self.manifest_url, known.as_deref())
            .await
        {
            Ok(ConditionalFetch::Changed { validator, body }) => {
                let tree: serde_json::Value = serde_json::from_slice(&body)
                    .map_err(|e| SourceError::new(ManifestError::Parse(e)))?;
                let leaves = collect_leaves(&tree);
                info!(
                    manifest = %self.manifest_url,
                    leaves = leaves.len(),
                    "manifest changed"
                );
                let mut roster = Vec::with_capacity(leaves.len());
                for path in leaves {
                    let url = format!("{}{}", self.base_url, path);
                    let leaf = inner
                        .history
                        .entry(path.clone())
                        .or_insert_with(|| Arc::new(Leaf::new(url)))
                        .clone();
                    roster.push((path, leaf));
                }
                inner.roster = roster;
                inner.manifest_validator = Some(validator);
            }
            Ok(ConditionalFetch::Unchanged) => {
                debug!(manifest = %self.manifest_url, "manifest unchanged, keeping roster");
            }
            Err(e) => return Err(SourceError::new(e)),
        }

        join_all(
            inner
                .roster
                .iter()
                .map(|(_, leaf)| leaf.refresh(&self.client)),
        )
        .await;

        let mut snapshot = Snapshot::default();
        for (path, leaf) in &inner.roster {
            if leaf.is_valid().await {
                let source = Arc::clone(leaf) as Arc<dyn ContentSource>;
                snapshot.push(
                    path.clone(),
                    Arc::new(ContentRef::new(leaf.url().to_string(), source)),
                );
            }
        }
        Ok(snapshot)
    }
}
