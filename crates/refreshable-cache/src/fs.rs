//! Filesystem snapshot source

use crate::entry::{ContentRef, ContentSource, ContentStream};
use crate::error::{SourceError, StreamError};
use crate::snapshot::{Snapshot, SnapshotSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

const INDEX_FILE: &str = "index.html";

/// Streams a file back from disk on every request
struct FileContent {
    full_path: PathBuf,
}

#[async_trait]
impl ContentSource for FileContent {
    async fn open(&self) -> Result<ContentStream, StreamError> {
        let file = tokio::fs::File::open(&self.full_path).await.map_err(|e| {
            StreamError::SourceUnavailable(format!("{}: {}", self.full_path.display(), e))
        })?;
        Ok(ContentStream::File(file))
    }
}

/// What one directory scan found
struct DirScan {
    dir: PathBuf,
    files: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
    index: Option<PathBuf>,
}

/// Recursive directory walk producing one candidate per regular file
///
/// Hidden directories (basename starting with `.`) are pruned without
/// descending; hidden files are skipped. Errors reading a node are logged
/// and that node simply contributes nothing — one unreadable subtree never
/// aborts the walk.
pub struct FilesystemSource {
    root: PathBuf,
    display_base: PathBuf,
}

impl FilesystemSource {
    /// `root` is the served tree; `display_base` is the prefix stripped
    /// from absolute paths for diagnostics (typically the working
    /// directory)
    pub fn new(root: impl Into<PathBuf>, display_base: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            display_base: display_base.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn display_for(&self, full: &Path) -> String {
        full.strip_prefix(&self.display_base)
            .unwrap_or(full)
            .to_string_lossy()
            .into_owned()
    }

    fn key_for(&self, full: &Path) -> Option<String> {
        let rel = full.strip_prefix(&self.root).ok()?;
        Some(format!("/{}", rel.to_string_lossy()))
    }

    fn push_file(&self, snapshot: &mut Snapshot, path: String, full: &Path) {
        let content = Arc::new(ContentRef::new(
            self.display_for(full),
            Arc::new(FileContent {
                full_path: full.to_path_buf(),
            }),
        ));
        snapshot.push(path, content);
    }

    /// Scan one directory, absorbing every per-node error
    async fn scan_dir(dir: PathBuf) -> DirScan {
        let mut scan = DirScan {
            files: Vec::new(),
            subdirs: Vec::new(),
            index: None,
            dir: dir.clone(),
        };
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return scan;
            }
        };
        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "directory listing truncated");
                    break;
                }
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => scan.subdirs.push(entry.path()),
                Ok(kind) if kind.is_file() => {
                    if name == INDEX_FILE {
                        scan.index = Some(entry.path());
                    }
                    scan.files.push(entry.path());
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "skipping unreadable node");
                }
            }
        }
        scan
    }
}

#[async_trait]
impl SnapshotSource for FilesystemSource {
    /// Walk the root, fanning out one task per directory
    ///
    /// The walk completes when the task set drains; a directory with no
    /// children completes immediately.
    async fn produce(&self) -> Result<Snapshot, SourceError> {
        let mut snapshot = Snapshot::default();
        if self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false)
        {
            debug!(root = %self.root.display(), "hidden root, producing nothing");
            return Ok(snapshot);
        }
        let mut pending: JoinSet<DirScan> = JoinSet::new();
        pending.spawn(Self::scan_dir(self.root.clone()));

        while let Some(joined) = pending.join_next().await {
            let scan = match joined {
                Ok(scan) => scan,
                Err(e) => {
                    debug!(error = %e, "directory scan task failed");
                    continue;
                }
            };
            for file in &scan.files {
                if let Some(key) = self.key_for(file) {
                    self.push_file(&mut snapshot, key, file);
                }
            }
            // a directory with an index file is itself addressable
            if let Some(index) = &scan.index {
                if let Some(dir_key) = self.key_for(&scan.dir) {
                    self.push_file(&mut snapshot, dir_key, index);
                }
            }
            for subdir in scan.subdirs {
                pending.spawn(Self::scan_dir(subdir));
            }
        }

        Ok(snapshot)
    }
}
