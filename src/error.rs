//! Error type shared by the codec, the tree and the command layer.

use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad magic, bad hex digits or a stream that ends inside a member.
    #[error("malformed cpio header at byte {offset:#x}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// A directory never received its own header.
    #[error("invalid tree: directory '{0}' has no metadata")]
    InvalidTree(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("field {field} of '{name}' does not fit in 32 bits: {value}")]
    FieldOverflow {
        field: &'static str,
        name: String,
        value: u64,
    },

    /// A directory, device, fifo or socket with a non-zero size.
    #[error("entry '{name}' cannot carry data but has {size} bytes")]
    UnexpectedPayload { name: String, size: u64 },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            offset,
            reason: reason.into(),
        }
    }
}
