//! Per-session error kinds.
//!
//! A `SessionError` is always terminal for the session it belongs to —
//! see spec §7, "Propagation policy". It never crosses a session
//! boundary; `Session::run` logs it and returns. Relay-phase failures
//! are not modeled here: by the time the relay starts, both pumps
//! handle and log their own I/O outcomes directly (spec §4.1 "RELAY"),
//! since EOF and genuine I/O errors must be told apart at the log site.

use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("resolution failed for {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: String,
        #[source]
        source: IoError,
    },

    #[error("could not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: String,
        #[source]
        source: IoError,
    },

    /// Socket I/O failure during the handshake/request/reply phases —
    /// none of the four named kinds above, but equally terminal.
    #[error("socket I/O error: {0}")]
    Io(#[from] IoError),
}

impl SessionError {
    pub(crate) fn protocol_io(source: IoError) -> Self {
        Self::Io(source)
    }
}
