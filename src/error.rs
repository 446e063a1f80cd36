//! Error types for cqcode operations.

use thiserror::Error;

/// Errors that can occur while constructing segments or messages.
///
/// Malformed markup is never an error: token-like input that does not
/// match the wire grammar degrades to plain text during parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A segment was constructed with an empty kind, or from an
    /// interchange value that has no usable kind.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// An interchange record carried a field other than `kind`/`params`.
    #[error("invalid segment field: {0}")]
    InvalidFieldAccess(String),

    /// A value could not be normalized into message segments. Raised by
    /// the append/extend/concatenation entry points after exhausting the
    /// recognized input shapes (string, record, segment, sequence).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
