#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Client configuration for the facility console.
//!
//! Layout: `defaults.rs` (constants), `error.rs` (error types), `model.rs` (typed
//! settings and the session context), `validate.rs` (field parsing and bounds),
//! `loader.rs` (defaults → file → environment → overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ConfigOverrides};
pub use model::{ClientConfig, ListSettings, LoggingSettings, SessionContext};
