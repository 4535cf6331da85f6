#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Torrent session runtime: resume loading on add, debounced checkpointing,
//! and change notifications on the event bus.

pub mod checkpoint;
pub mod error;
pub mod feed;
pub mod session;
pub mod tracked;

pub use checkpoint::{CheckpointReport, Checkpointer};
pub use error::{RuntimeError, RuntimeResult};
pub use feed::{ChangeFeed, publish_changes};
pub use session::{
    AddRequest, AddedTorrent, RemoveOptions, RemovedTorrent, SessionOptions, TorrentSession,
};
pub use tracked::TrackedTorrents;

use std::error::Error;

/// Render an error and its sources as one line.
pub(crate) fn describe(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
