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

//! Event bus for torrent sync and resume notifications.
//!
//! The bus assigns sequential identifiers and keeps a bounded replay ring so a
//! subscriber that reconnects can resume from the last id it saw. Internally it
//! uses `tokio::broadcast`; when a subscriber falls behind, the oldest events are
//! dropped for that subscriber only.
//! Layout: payloads.rs (event types), routing.rs (bus and streams).

pub mod payloads;
pub mod routing;

pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
