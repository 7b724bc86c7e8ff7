//! Error types for the few fallible edges of the registry.
//!
//! Registry mutators themselves never fail: a missing chunk or entity is a
//! silent no-op so that a transient inconsistency cannot abort a tick.

/// Failure to parse the canonical `"x,z"` chunk id form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkIdParseError {
    /// The string has no `,` between the coordinates.
    #[error("chunk id {0:?} is missing the ',' separator")]
    MissingSeparator(String),

    /// A coordinate is not a 32-bit integer.
    #[error("chunk id {0:?} has a non-integer coordinate")]
    InvalidCoordinate(String),
}

/// Failure reported by a [`PersistenceSink`](crate::sink::PersistenceSink).
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The storage backend rejected or failed the write.
    #[error("persistence backend failed: {0}")]
    Backend(String),

    /// An I/O error while writing.
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),
}
