//! Servable entry model

use crate::error::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// An open byte stream for one entry's content
pub enum ContentStream {
    /// Streamed from an open file
    File(tokio::fs::File),
    /// Served from an in-memory buffer
    Bytes(Bytes),
}

/// Capability to open an entry's content for streaming
///
/// Implementations re-open the underlying source on every call; response
/// bytes are never cached at this layer.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn open(&self) -> Result<ContentStream, StreamError>;
}

/// An opaque content locator paired with the human-readable path shown in
/// diagnostics
pub struct ContentRef {
    display_path: String,
    source: Arc<dyn ContentSource>,
}

impl ContentRef {
    pub fn new(display_path: impl Into<String>, source: Arc<dyn ContentSource>) -> Self {
        Self {
            display_path: display_path.into(),
            source,
        }
    }

    /// Where this content came from, for diagnostics only
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub async fn open(&self) -> Result<ContentStream, StreamError> {
        self.source.open().await
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentRef")
            .field("display_path", &self.display_path)
            .finish()
    }
}

/// One reconciled lookup entry
///
/// `Ambiguous` marks a key that two distinct source paths normalized to;
/// it never serves and never silently picks one of the colliding sources.
#[derive(Clone, Debug)]
pub enum Entry {
    Valid(Arc<ContentRef>),
    Ambiguous,
}

impl Entry {
    pub async fn open(&self) -> Result<ContentStream, StreamError> {
        match self {
            Self::Valid(content) => content.open().await,
            Self::Ambiguous => Err(StreamError::AmbiguousKey),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous)
    }
}
