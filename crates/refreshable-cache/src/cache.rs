//! The refreshable cache itself

use crate::dispatch::{Handler, Reply};
use crate::entry::Entry;
use crate::reconcile::{normalize_key, reconcile};
use crate::snapshot::SnapshotSource;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

const NOT_LOADED_DIAGNOSTIC: &str = r#"{"error": "Not yet loaded..."}"#;
const LOAD_FAILED_DIAGNOSTIC: &str = r#"{"error": "problem loading"}"#;

struct LiveState {
    map: HashMap<String, Entry>,
    diagnostic: String,
}

/// A key-addressed content cache refreshed from one [`SnapshotSource`]
///
/// The live map is only ever replaced whole, so concurrent requests see
/// either the pre-refresh or the post-refresh map, never a torn one. At
/// most one refresh is in flight per cache; re-entrant triggers are
/// dropped, not queued. A failed cycle keeps the previous map and serves
/// it stale.
pub struct RefreshableCache {
    api_base: String,
    refresh_endpoint: String,
    diagnostics_endpoint: String,
    source: Box<dyn SnapshotSource>,
    interval: Duration,
    live: RwLock<LiveState>,
    refreshing: AtomicBool,
    started: AtomicBool,
    wake_tx: mpsc::Sender<()>,
    wake_rx: std::sync::Mutex<Option<mpsc::Receiver<()>>>,
}

impl RefreshableCache {
    /// Create a cache serving `{api_base}/refresh`, `{api_base}/diagnostics`
    /// and every key the source produces
    ///
    /// The scheduler is not running yet; call [`start`](Self::start) to
    /// kick off the initial refresh and the periodic cycle.
    pub fn new(
        api_base: impl Into<String>,
        source: Box<dyn SnapshotSource>,
        interval: Duration,
    ) -> Arc<Self> {
        let api_base = normalize_key(&api_base.into());
        let (wake_tx, wake_rx) = mpsc::channel(1);
        Arc::new(Self {
            refresh_endpoint: format!("{}/refresh", api_base),
            diagnostics_endpoint: format!("{}/diagnostics", api_base),
            api_base,
            source,
            interval,
            live: RwLock::new(LiveState {
                map: HashMap::new(),
                diagnostic: NOT_LOADED_DIAGNOSTIC.to_string(),
            }),
            refreshing: AtomicBool::new(false),
            started: AtomicBool::new(false),
            wake_tx,
            wake_rx: std::sync::Mutex::new(Some(wake_rx)),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Spawn the refresh scheduler
    ///
    /// Runs an initial refresh immediately, then self-reschedules: each
    /// cycle sleeps the full interval after the previous one completes, so
    /// a slow refresh pushes the next one back instead of piling up. The
    /// refresh endpoint wakes the loop early. Calling `start` twice is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut wake = match self.wake_rx.lock() {
            Ok(mut slot) => match slot.take() {
                Some(rx) => rx,
                None => return,
            },
            Err(_) => return,
        };
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                cache.refresh().await;
                tokio::select! {
                    _ = tokio::time::sleep(cache.interval) => {}
                    _ = wake.recv() => {
                        debug!(api_base = %cache.api_base, "refresh triggered");
                    }
                }
            }
        });
    }

    /// Run one refresh cycle to completion
    ///
    /// A no-op if another refresh is already in flight.
    pub async fn refresh(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(api_base = %self.api_base, "refresh already in flight, skipping");
            return;
        }

        match self.source.produce().await {
            Ok(snapshot) => {
                let previous = self.live.read().await.map.clone();
                let reconciled = reconcile(snapshot, &previous);
                let diagnostic = serde_json::to_string(&reconciled.listing)
                    .unwrap_or_else(|_| LOAD_FAILED_DIAGNOSTIC.to_string());
                info!(
                    api_base = %self.api_base,
                    entries = reconciled.map.len(),
                    "cache refreshed"
                );
                let mut live = self.live.write().await;
                live.map = reconciled.map;
                live.diagnostic = diagnostic;
            }
            Err(e) => {
                warn!(
                    api_base = %self.api_base,
                    error = %e,
                    "refresh failed, keeping previous entries"
                );
                self.live.write().await.diagnostic = LOAD_FAILED_DIAGNOSTIC.to_string();
            }
        }

        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// Fire-and-forget refresh trigger
    ///
    /// Dropped outright when a refresh is already in flight.
    fn trigger_refresh(&self) {
        if self.refreshing.load(Ordering::SeqCst) {
            debug!(api_base = %self.api_base, "refresh already in flight, trigger dropped");
            return;
        }
        let _ = self.wake_tx.try_send(());
    }

    async fn lookup(&self, path: &str) -> Option<Entry> {
        let live = self.live.read().await;
        if let Some(entry) = live.map.get(path) {
            return Some(entry.clone());
        }
        // a trailing-slash request resolves like its trimmed form
        match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => live.map.get(trimmed).cloned(),
            _ => None,
        }
    }
}

#[async_trait]
impl Handler for RefreshableCache {
    async fn serve(&self, method: &Method, path: &str) -> Option<Reply> {
        if path == self.refresh_endpoint {
            self.trigger_refresh();
            return Some(Reply::text(StatusCode::OK, "Refreshing..."));
        }
        if *method != Method::GET {
            return None;
        }
        if path == self.diagnostics_endpoint {
            let diagnostic = self.live.read().await.diagnostic.clone();
            return Some(Reply::json(StatusCode::OK, diagnostic));
        }

        let entry = self.lookup(path).await?;
        match entry.open().await {
            Ok(stream) => Some(Reply::stream(StatusCode::OK, stream)),
            Err(e) => {
                warn!(path = %path, error = %e, "unable to stream entry");
                Some(Reply::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unable to serve content",
                ))
            }
        }
    }
}
