//! Error kinds raised by the server
//!
//! Only [`ConnectionError`] feeds the forfeit path. Malformed client input is
//! a [`shared::ProtocolError`] and is dropped where it is decoded.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// A player's stream is no longer usable.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed by peer")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    #[error("slot has no live connection")]
    NotConnected,
}

/// Failures that stop the server before it can serve matches.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("listener error: {0}")]
    Listener(#[from] io::Error),
}
