//! Classified messages delivered to consumers.

use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A classified change in the watched tree.
///
/// Every variant except `Error` and `Deleted` carries [`FileInfo`] fetched when
/// the raw event was classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// A failure after construction. `path` is `None` when the failure is not
    /// tied to a path, e.g. an error reported by the event source itself.
    Error {
        path: Option<PathBuf>,
        cause: String,
    },

    /// A file or directory appeared.
    Created { path: PathBuf, info: FileInfo },

    /// Contents were written.
    Changed { path: PathBuf, info: FileInfo },

    /// A watched directory went away.
    Deleted { path: PathBuf },

    /// Something was renamed; `path` is the new name.
    Renamed { path: PathBuf, info: FileInfo },

    /// Permissions or other attributes changed.
    Chmoded { path: PathBuf, info: FileInfo },
}

impl Message {
    pub(crate) fn error(path: Option<&Path>, cause: impl fmt::Display) -> Self {
        Self::Error {
            path: path.map(Path::to_path_buf),
            cause: cause.to_string(),
        }
    }

    /// Path the message is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Error { path, .. } => path.as_deref(),
            Self::Created { path, .. }
            | Self::Changed { path, .. }
            | Self::Deleted { path }
            | Self::Renamed { path, .. }
            | Self::Chmoded { path, .. } => Some(path),
        }
    }

    /// File info captured at classification time, if the variant carries it.
    pub fn info(&self) -> Option<&FileInfo> {
        match self {
            Self::Created { info, .. }
            | Self::Changed { info, .. }
            | Self::Renamed { info, .. }
            | Self::Chmoded { info, .. } => Some(info),
            Self::Error { .. } | Self::Deleted { .. } => None,
        }
    }

    /// Whether this is an `Error` message.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { path, cause } => {
                let path = path.as_deref().unwrap_or(Path::new(""));
                write!(f, "ERROR ({}): {cause}", path.display())
            }
            Self::Created { path, info } => {
                write!(f, "CREATED ({}) (dir={})", path.display(), info.is_dir)
            }
            Self::Changed { path, info } => {
                write!(f, "CHANGED ({}) (dir={})", path.display(), info.is_dir)
            }
            Self::Deleted { path } => write!(f, "DELETED ({})", path.display()),
            Self::Renamed { path, info } => {
                write!(f, "RENAMED ({}) (dir={})", path.display(), info.is_dir)
            }
            Self::Chmoded { path, info } => {
                write!(f, "CHMODED ({}) (dir={})", path.display(), info.is_dir)
            }
        }
    }
}

/// Filesystem info for a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Whether the path is a directory.
    pub is_dir: bool,

    /// Whether the path is a regular file.
    pub is_file: bool,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time, where the platform reports one.
    pub modified: Option<DateTime<Utc>>,

    /// Whether the path is read-only.
    pub readonly: bool,
}

impl FileInfo {
    /// Stat `path`, following symlinks.
    pub fn stat(path: &Path) -> std::io::Result<Self> {
        std::fs::metadata(path).map(|metadata| Self::from(&metadata))
    }
}

impl From<&Metadata> for FileInfo {
    fn from(metadata: &Metadata) -> Self {
        Self {
            is_dir: metadata.is_dir(),
            is_file: metadata.is_file(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            readonly: metadata.permissions().readonly(),
        }
    }
}
