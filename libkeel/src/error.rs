//! Error plumbing. A malformed input surfaces as an `anyhow` error carrying
//! the offending filename in its context chain; the driver decides how to
//! print it.

pub use anyhow::Context;

/// Shorthand used throughout the crate: a bare `Result` is a fallible unit
/// operation, and the error type is always `anyhow`'s.
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
