//! Alias registry for typed wire documents.
//!
//! Maps wire aliases (the short names that appear in `!Alias` tags and
//! binary type prefixes) to Rust types and back, carrying one caller-supplied
//! entry per registration — typically a pair of marshalling callbacks. The
//! registry is configured once at start-up, optionally frozen, and then read
//! concurrently.

pub mod config;
pub mod error;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use registry::AliasRegistry;
