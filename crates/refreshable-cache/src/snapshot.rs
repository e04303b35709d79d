//! Snapshot production contract

use crate::entry::ContentRef;
use crate::error::SourceError;
use async_trait::async_trait;
use std::sync::Arc;

/// One source path observed by a backend, before normalization
///
/// Paths are rooted (`/docs/Index.html`) and keep their source casing; the
/// reconciler owns case-folding, hidden-path exclusion and conflict
/// detection.
pub struct Candidate {
    pub path: String,
    pub content: Arc<ContentRef>,
}

/// The complete set of candidates produced by one backend call
///
/// Not persisted; its lifetime is a single refresh cycle. The cache swaps
/// its live map only after the whole snapshot has been reconciled.
#[derive(Default)]
pub struct Snapshot {
    candidates: Vec<Candidate>,
}

impl Snapshot {
    pub fn push(&mut self, path: impl Into<String>, content: Arc<ContentRef>) {
        self.candidates.push(Candidate {
            path: path.into(),
            content,
        });
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub(crate) fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// A pluggable backend that can produce a snapshot of entries
///
/// Sources are pure producers: they hold whatever fetch state they need
/// (validators, open rosters) but never schedule their own refreshes —
/// the owning cache drives every cycle.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn produce(&self) -> Result<Snapshot, SourceError>;
}
