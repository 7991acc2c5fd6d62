//! Configuration for a recursive watcher.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Messages the outbound stream may hold before the processing loop blocks.
pub const DEFAULT_MESSAGE_BUFFER: usize = 1;

/// Configuration for a watched tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Root of the tree. May be relative; resolved at construction.
    pub root: PathBuf,

    /// Whether the initial walk descends into symlinked directories.
    pub follow_symlinks: bool,

    /// Capacity of the outbound message stream.
    pub message_buffer: usize,
}

impl WatcherConfig {
    /// Create a config for `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            message_buffer: DEFAULT_MESSAGE_BUFFER,
        }
    }

    /// Follow symbolic links during the initial walk.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// Set the outbound stream capacity.
    pub fn with_message_buffer(mut self, capacity: usize) -> Self {
        self.message_buffer = capacity;
        self
    }

    /// Capacity actually used for the outbound channel, which needs at least one slot.
    pub(crate) fn channel_capacity(&self) -> usize {
        self.message_buffer.max(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_watcher_config_defaults() {
        let config = WatcherConfig::new("some/tree");

        assert_eq!(config.root, Path::new("some/tree"));
        assert!(!config.follow_symlinks);
        assert_eq!(config.channel_capacity(), 1);
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let config = WatcherConfig::new("/tree").with_message_buffer(0);
        assert_eq!(config.message_buffer, 0);
        assert_eq!(config.channel_capacity(), 1);
    }

    #[test]
    fn test_config_from_json() {
        let config: WatcherConfig = serde_json::from_str(
            r#"{"root":"/srv/data","follow_symlinks":true,"message_buffer":8}"#,
        )
        .unwrap();

        assert_eq!(
            config,
            WatcherConfig::new("/srv/data")
                .follow_symlinks()
                .with_message_buffer(8)
        );
    }
}
