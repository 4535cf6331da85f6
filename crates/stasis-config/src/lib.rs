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

//! Runtime configuration loaded from an optional JSON file and `STASIS_*`
//! environment variables.
//!
//! Layout: `model.rs` (typed config), `loader.rs` (file and environment layering),
//! `validate.rs` (field checks), `defaults.rs` (default values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_VAR, ConfigLoader, ENV_PREFIX};
pub use model::StasisConfig;
