//! # rwatch
//!
//! Recursive directory-tree watching built on a non-recursive,
//! single-directory event source.
//!
//! A [`RecursiveWatcher`] walks its root at construction and watches every
//! directory it finds, then keeps the set current as directories are created
//! and removed. Raw `(path, operation)` events are classified into
//! [`Message`]s and handed to the consumer one at a time, in order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Recursive Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EventSource ──► RawEvent ──► Processor ──► Message ──► consumer│
//! │                                  │                              │
//! │                                  ▼                              │
//! │                               WatchSet                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Known limitations
//!
//! - Directories created while the initial walk runs, or inside a new
//!   directory before its watch is registered, may go unreported.
//! - Only removals of watched directories produce [`Message::Deleted`]; file
//!   removals are not reported.
//! - A rename is reported under its new name only.
//! - A directory whose registration failed is not retried.
//! - After a backend queue overflow the watcher reports an error but does not
//!   rescan the tree.

pub mod config;
pub mod error;
pub mod message;
pub mod source;
pub mod watch_set;
pub mod watcher;

pub use config::WatcherConfig;
pub use error::{Result, WatcherError};
pub use message::{FileInfo, Message};
pub use source::{EventSource, NotifySource, RawEvent, RawOp, SourceError, SourceStreams};
pub use watch_set::WatchSet;
pub use watcher::RecursiveWatcher;
