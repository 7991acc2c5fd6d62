//! Error types for the recursive watcher.

use std::path::PathBuf;

use thiserror::Error;

use crate::source::SourceError;

/// Result type alias for watcher construction.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that abort construction of a [`RecursiveWatcher`](crate::RecursiveWatcher).
///
/// Failures after construction never surface here; they are delivered as
/// [`Message::Error`](crate::Message::Error) on the outbound stream.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The root could not be made absolute and canonical.
    #[error("failed to resolve {}: {source}", .path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root resolved to something other than a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The event source could not be created.
    #[error("failed to initialize event source: {0}")]
    SourceInit(#[source] SourceError),

    /// A directory found during the initial walk could not be watched.
    #[error("failed to watch {}: {source}", .path.display())]
    WatchRegistration {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_messages_name_the_path() {
        let err = WatcherError::PathResolution {
            path: PathBuf::from("/missing/dir"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to resolve /missing/dir: "));

        let err = WatcherError::WatchRegistration {
            path: PathBuf::from("/tree/sub"),
            source: SourceError::Closed,
        };
        assert_eq!(
            err.to_string(),
            "failed to watch /tree/sub: event source is closed"
        );
    }
}
