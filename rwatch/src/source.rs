//! Single-directory event sources.
//!
//! An [`EventSource`] watches individual directories (never recursively) and
//! reports raw `(path, operation)` pairs plus its own errors on two streams.
//! [`NotifySource`] is the production implementation over `notify`.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Errors raised by an event source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Error from the notify backend.
    #[error(transparent)]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The backend's queue overflowed and events were lost.
    #[error("event queue overflowed; rescan needed")]
    Overflow,

    /// The backend reported an operation without naming a path.
    #[error("{0} event without a path")]
    MissingPath(RawOp),

    /// The source has been shut down.
    #[error("event source is closed")]
    Closed,
}

/// Operation reported for a raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
    /// An operation outside the uniform model, with the backend's description.
    Unknown(String),
}

impl RawOp {
    /// Map a notify event kind onto the uniform model.
    ///
    /// Returns `None` for kinds that are not forwarded: access notifications,
    /// and the old-name halves of a rename (the new name arrives separately
    /// as `RenameMode::To`).
    pub fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Remove(_) => Some(Self::Remove),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Self::Chmod),
            EventKind::Modify(ModifyKind::Name(RenameMode::From | RenameMode::Both)) => None,
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(_) => Some(Self::Write),
            EventKind::Access(_) => None,
            EventKind::Any | EventKind::Other => Some(Self::Unknown(format!("{kind:?}"))),
        }
    }
}

impl fmt::Display for RawOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Write => f.write_str("write"),
            Self::Remove => f.write_str("remove"),
            Self::Rename => f.write_str("rename"),
            Self::Chmod => f.write_str("chmod"),
            Self::Unknown(op) => write!(f, "unknown ({op})"),
        }
    }
}

/// A raw event as delivered by the source, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub op: RawOp,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, op: RawOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// The two streams an event source reports on. Both end once the source is closed.
#[derive(Debug)]
pub struct SourceStreams {
    pub events: mpsc::UnboundedReceiver<RawEvent>,
    pub errors: mpsc::UnboundedReceiver<SourceError>,
}

/// A primitive that watches single directories.
pub trait EventSource: Send + 'static {
    /// Start reporting changes directly inside `path`.
    fn watch(&mut self, path: &Path) -> Result<(), SourceError>;

    /// Shut the source down. Both streams end once in-flight items are drained.
    fn close(self);
}

/// Event source backed by the platform's recommended notify watcher.
pub struct NotifySource {
    watcher: RecommendedWatcher,
}

impl NotifySource {
    /// Create the source and the streams it reports on.
    pub fn new() -> Result<(Self, SourceStreams), SourceError> {
        // Unbounded so the notify thread never blocks on us; `watch` round-trips
        // through that thread on some backends.
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                forward(res, &event_tx, &error_tx);
            },
        )?;

        Ok((Self { watcher }, SourceStreams { events, errors }))
    }
}

/// Split a notify callback result onto the event and error streams.
///
/// Overflow notices and events that name no path go to the error stream, so
/// the consumer learns that changes may have been missed.
fn forward(
    res: std::result::Result<notify::Event, notify::Error>,
    events: &mpsc::UnboundedSender<RawEvent>,
    errors: &mpsc::UnboundedSender<SourceError>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            let _ = errors.send(SourceError::from(e));
            return;
        }
    };

    if event.need_rescan() {
        warn!("Event queue overflowed: {:?}", event.kind);
        let _ = errors.send(SourceError::Overflow);
    }

    let Some(op) = RawOp::from_kind(&event.kind) else {
        trace!("Ignoring {:?} for {:?}", event.kind, event.paths);
        return;
    };

    if event.paths.is_empty() {
        if !event.need_rescan() {
            let _ = errors.send(SourceError::MissingPath(op));
        }
        return;
    }

    for path in event.paths {
        trace!("Raw {op} event: {}", path.display());
        if events.send(RawEvent::new(path, op.clone())).is_err() {
            return;
        }
    }
}

impl EventSource for NotifySource {
    fn watch(&mut self, path: &Path) -> Result<(), SourceError> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn close(self) {
        // Dropping the watcher stops the backend thread, which drops the
        // handler and with it both senders.
        drop(self.watcher);
        debug!("Event source closed");
    }
}
