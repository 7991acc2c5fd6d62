//! Recursive watcher implementation.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::WatcherConfig;
use crate::error::{Result, WatcherError};
use crate::message::{FileInfo, Message};
use crate::source::{EventSource, NotifySource, RawEvent, RawOp, SourceError, SourceStreams};
use crate::watch_set::WatchSet;

/// Watches a directory and all of its subdirectories, present and future.
///
/// Messages are handed off one at a time: the processing loop does not pick
/// up the next raw event until the consumer has room for the current message,
/// so a consumer that stops reading stalls the whole watcher.
///
/// Dropping the watcher without calling [`close`](Self::close) still stops
/// the processing loop, but does not wait for it.
pub struct RecursiveWatcher {
    /// Canonical root of the watched tree.
    root: PathBuf,

    /// Outbound stream, until a consumer takes it.
    messages: Option<mpsc::Receiver<Message>>,

    /// Signals the processing loop to shut down.
    closing: CancellationToken,

    /// The processing loop.
    task: Option<JoinHandle<()>>,
}

impl RecursiveWatcher {
    /// Watch `root` with default settings.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(WatcherConfig::new(root))
    }

    /// Watch the tree described by `config` using the platform's notify backend.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_config(config: WatcherConfig) -> Result<Self> {
        let root = resolve_root(&config.root)?;
        let (source, streams) = NotifySource::new().map_err(WatcherError::SourceInit)?;
        Self::start(root, &config, source, streams)
    }

    /// Watch the tree described by `config` on top of an arbitrary event source.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_source<S: EventSource>(
        config: WatcherConfig,
        source: S,
        streams: SourceStreams,
    ) -> Result<Self> {
        let root = resolve_root(&config.root)?;
        Self::start(root, &config, source, streams)
    }

    fn start<S: EventSource>(
        root: PathBuf,
        config: &WatcherConfig,
        mut source: S,
        streams: SourceStreams,
    ) -> Result<Self> {
        let watches = match WatchSet::seed(&mut source, &root, config.follow_symlinks) {
            Ok(watches) => watches,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        info!(
            "Watching {} directories under {}",
            watches.len(),
            root.display()
        );

        let (outbound, messages) = mpsc::channel(config.channel_capacity());
        let closing = CancellationToken::new();

        let processor = Processor {
            source: Some(source),
            watches,
            events: streams.events,
            errors: streams.errors,
            outbound: Some(outbound),
            closing: closing.clone(),
        };
        let task = tokio::spawn(processor.run());

        Ok(Self {
            root,
            messages: Some(messages),
            closing,
            task: Some(task),
        })
    }

    /// Canonical root of the watched tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive the next message. Returns `None` once the stream has ended or
    /// has been taken with [`take_messages`](Self::take_messages).
    pub async fn recv(&mut self) -> Option<Message> {
        match self.messages.as_mut() {
            Some(messages) => messages.recv().await,
            None => None,
        }
    }

    /// Take the outbound stream, e.g. to drain it from another task.
    pub fn take_messages(&mut self) -> Option<mpsc::Receiver<Message>> {
        self.messages.take()
    }

    /// Stop watching and wait for the processing loop to exit.
    ///
    /// The event source is closed first, then the outbound stream. Once this
    /// returns no further messages are delivered.
    pub async fn close(mut self) {
        self.closing.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Watcher task for {} failed: {e}", self.root.display());
            }
        }

        info!("Stopped watching {}", self.root.display());
    }
}

impl Drop for RecursiveWatcher {
    fn drop(&mut self) {
        self.closing.cancel();
    }
}

/// Make `path` absolute and canonical, and require a directory there.
fn resolve_root(path: &Path) -> Result<PathBuf> {
    let root = dunce::canonicalize(path).map_err(|source| WatcherError::PathResolution {
        path: path.to_path_buf(),
        source,
    })?;

    if !root.is_dir() {
        return Err(WatcherError::NotADirectory(root));
    }

    Ok(root)
}

/// State owned by the processing loop.
struct Processor<S> {
    /// `None` once shutdown has begun.
    source: Option<S>,
    watches: WatchSet,
    events: mpsc::UnboundedReceiver<RawEvent>,
    errors: mpsc::UnboundedReceiver<SourceError>,
    /// `None` once shutdown has begun.
    outbound: Option<mpsc::Sender<Message>>,
    closing: CancellationToken,
}

impl<S: EventSource> Processor<S> {
    /// Runs until both source streams have ended.
    async fn run(mut self) {
        let mut events_open = true;
        let mut errors_open = true;

        while events_open || errors_open {
            tokio::select! {
                biased;

                () = self.closing.cancelled(), if self.outbound.is_some() => self.shut_down(),

                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => events_open = false,
                },

                err = self.errors.recv(), if errors_open => match err {
                    Some(err) => {
                        warn!("Event source error: {err}");
                        self.emit(Message::error(None, err)).await;
                    }
                    None => errors_open = false,
                },
            }
        }

        debug!("Processing loop exited with {} watches", self.watches.len());
    }

    async fn handle_event(&mut self, event: RawEvent) {
        if self.outbound.is_none() {
            trace!("Draining {} after shutdown", event.path.display());
            return;
        }

        for message in self.classify(event) {
            self.emit(message).await;
        }
    }

    fn classify(&mut self, RawEvent { path, op }: RawEvent) -> Vec<Message> {
        if op == RawOp::Remove {
            if self.watches.remove(&path) {
                return vec![Message::Deleted { path }];
            }
            return Vec::new();
        }

        let info = match FileInfo::stat(&path) {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to stat {} after {op}: {e}", path.display());
                return vec![Message::error(Some(path.as_path()), e)];
            }
        };

        match op {
            RawOp::Create => self.created(path, info),
            RawOp::Write => vec![Message::Changed { path, info }],
            RawOp::Rename => vec![Message::Renamed { path, info }],
            RawOp::Chmod => vec![Message::Chmoded { path, info }],
            RawOp::Unknown(kind) => {
                vec![Message::error(None, format!("unknown operation ({kind})"))]
            }
            // classified before the stat
            RawOp::Remove => Vec::new(),
        }
    }

    /// A new directory is registered before its `Created` goes out, so events
    /// inside it are reported from the moment the consumer learns of it.
    fn created(&mut self, path: PathBuf, info: FileInfo) -> Vec<Message> {
        let failure = if info.is_dir {
            self.register(&path).err()
        } else {
            None
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(e) = failure {
            warn!("Failed to watch new directory {}: {e}", path.display());
            messages.push(Message::Created {
                path: path.clone(),
                info,
            });
            messages.push(Message::error(Some(path.as_path()), e));
        } else {
            messages.push(Message::Created { path, info });
        }
        messages
    }

    fn register(&mut self, dir: &Path) -> std::result::Result<(), SourceError> {
        match self.source.as_mut() {
            Some(source) => self.watches.watch(source, dir),
            None => Err(SourceError::Closed),
        }
    }

    /// Hand `message` to the consumer, giving up if shutdown begins meanwhile.
    async fn emit(&mut self, message: Message) {
        let Some(outbound) = self.outbound.as_ref() else {
            return;
        };

        let shutdown_requested = tokio::select! {
            biased;

            () = self.closing.cancelled() => true,

            sent = outbound.send(message) => {
                if let Err(e) = sent {
                    trace!("Consumer is gone, dropping {}", e.0);
                }
                false
            }
        };

        if shutdown_requested {
            self.shut_down();
        }
    }

    /// Close the source, then the outbound stream. The loop keeps draining
    /// until the source's streams end.
    fn shut_down(&mut self) {
        if let Some(source) = self.source.take() {
            source.close();
        }
        self.outbound = None;
        debug!("Shutdown requested; draining event source");
    }
}
