//! Crate-internal prelude.

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, crate::errors::Error>;
