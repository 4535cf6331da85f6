//! Command handlers. Each returns the text to print.

pub(crate) mod catalog;
pub(crate) mod config;
pub(crate) mod snapshots;
