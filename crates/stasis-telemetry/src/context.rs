//! Span helpers shared by the runtime and the CLI.
//!
//! # Design
//! - A process-level span carries mode and build info for every event below it.
//! - Per-torrent work runs inside a span keyed by the torrent id.

use std::fmt::Display;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("stasis", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span wrapping work on a single torrent.
#[must_use]
pub fn torrent_span(operation: &'static str, torrent_id: impl Display) -> Span {
    tracing::info_span!("torrent", operation, torrent_id = %torrent_id)
}
