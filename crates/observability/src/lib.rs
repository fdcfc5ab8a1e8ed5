//! Tracing and logging setup shared by the binaries.

/// Tracing subscriber configuration.
pub mod tracing;

pub use self::tracing::{init, init_with, LogFormat};
