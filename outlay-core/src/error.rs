//! Error types for outlay-core

use thiserror::Error;

/// Main error type for the outlay-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A referenced entity was absent from the snapshot.
    ///
    /// Orchestrators treat the presence of every referenced entity as a
    /// caller precondition; this is the only error they return.
    #[error("{kind} not found in snapshot: {id}")]
    MissingEntity { kind: &'static str, id: String },

    /// Outbound command queue is full
    #[error("dispatch queue full ({capacity} commands)")]
    QueueFull { capacity: usize },
}

impl Error {
    /// Shorthand for a missing-entity precondition violation.
    pub fn missing(kind: &'static str, id: impl Into<String>) -> Self {
        Error::MissingEntity {
            kind,
            id: id.into(),
        }
    }
}

/// Result type alias for outlay-core
pub type Result<T> = std::result::Result<T, Error>;
