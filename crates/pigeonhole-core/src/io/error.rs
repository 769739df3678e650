//! Error types for transport operations

use crate::codec::CodecError;
use crate::schema::{Address, AddressError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while sending, receiving or managing queues
#[derive(Error, Debug)]
pub enum TransportError {
    /// File or directory I/O error under the working root
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing a message into its destination queue failed
    #[error("Failed to send message to address: {address} ({path}): {source}")]
    SendFailed {
        address: Address,
        path: PathBuf,
        source: std::io::Error,
    },

    /// A message file could not be decoded
    #[error("Malformed message file {path}: {source}")]
    Malformed { path: PathBuf, source: CodecError },

    /// Message id cannot be used as a file name
    #[error("Invalid message id '{0}'")]
    InvalidMessageId(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

impl TransportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
