//! Bookkeeping of directories registered with the event source.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, WatcherError};
use crate::source::{EventSource, SourceError};

/// Directories that currently hold a watch.
///
/// Owned by the processing loop once the watcher is running; it is the only
/// writer, so no locking is involved.
#[derive(Debug, Default)]
pub struct WatchSet {
    dirs: HashSet<PathBuf>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dir` with `source` and record it on success.
    pub fn watch<S: EventSource>(
        &mut self,
        source: &mut S,
        dir: &Path,
    ) -> std::result::Result<(), SourceError> {
        source.watch(dir)?;
        self.dirs.insert(dir.to_path_buf());
        debug!("Watching {}", dir.display());
        Ok(())
    }

    /// Drop `dir` from the set. Returns whether it was present.
    pub fn remove(&mut self, dir: &Path) -> bool {
        let removed = self.dirs.remove(dir);
        if removed {
            debug!("Dropped watch on {}", dir.display());
        }
        removed
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    /// Walk the tree under `root` and watch every directory in it, `root` included.
    ///
    /// Aborts on the first directory that cannot be read or registered.
    /// When following symlinks, dangling links and links back to an ancestor
    /// are skipped. Directories created while the walk is in progress may be
    /// missed.
    pub fn seed<S: EventSource>(
        source: &mut S,
        root: &Path,
        follow_symlinks: bool,
    ) -> Result<Self> {
        let mut set = Self::new();

        for entry in WalkDir::new(root).follow_links(follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_broken_link(&e) => {
                    debug!("Skipping {}: {e}", e.path().unwrap_or(root).display());
                    continue;
                }
                Err(e) => {
                    return Err(WatcherError::WatchRegistration {
                        path: e.path().unwrap_or(root).to_path_buf(),
                        source: SourceError::Io(e.into()),
                    });
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            set.watch(source, entry.path())
                .map_err(|source| WatcherError::WatchRegistration {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
        }

        Ok(set)
    }
}

/// A followed link that loops back to an ancestor or points nowhere.
/// The root itself never qualifies.
fn is_broken_link(err: &walkdir::Error) -> bool {
    if err.depth() == 0 {
        return false;
    }
    err.loop_ancestor().is_some()
        || err.io_error().map(std::io::Error::kind) == Some(std::io::ErrorKind::NotFound)
}
