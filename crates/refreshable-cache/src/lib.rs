//! Refreshable key-addressed content cache
//!
//! A cache maps normalized lookup keys to servable entries. Contents are
//! produced by a pluggable [`SnapshotSource`] (filesystem walk, remote
//! manifest, ...) and reconciled into the live map on a periodic refresh:
//! keys are case-folded, hidden paths dropped, colliding keys poisoned and
//! directory keys aliased to their `index.html` leaf. Request handling is
//! chained through a [`Dispatcher`] that tries each mounted handler in
//! order before falling back to a not-found response.

mod cache;
mod dispatch;
mod entry;
mod error;
mod fs;
mod reconcile;
mod snapshot;

pub use cache::RefreshableCache;
pub use dispatch::{Dispatcher, Handler, NotFoundHandler, Reply, ReplyBody};
pub use entry::{ContentRef, ContentSource, ContentStream, Entry};
pub use error::{SourceError, StreamError};
pub use fs::FilesystemSource;
pub use reconcile::normalize_key;
pub use snapshot::{Candidate, Snapshot, SnapshotSource};
