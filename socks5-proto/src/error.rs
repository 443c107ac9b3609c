//! Error types for the SOCKS5 protocol

use crate::{handshake::Method, Command, Reply};
use std::io::Error as IoError;
use thiserror::Error;

/// Errors that may occur while parsing a protocol header.
///
/// Since parsing follows certain steps, some variants carry previously
/// parsed data for better error reporting.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported SOCKS version {version:#04x}")]
    ProtocolVersion { version: u8 },

    #[error("no acceptable handshake method")]
    NoAcceptableHandshakeMethod {
        version: u8,
        chosen_method: Method,
        methods: Vec<Method>,
    },

    #[error("unsupported command {command:#04x}")]
    InvalidCommand { version: u8, command: u8 },

    #[error("unsupported reply {reply:#04x}")]
    InvalidReply { version: u8, reply: u8 },

    #[error("unsupported address type in request {address_type:#04x}")]
    InvalidAddressTypeInRequest {
        version: u8,
        command: Command,
        address_type: u8,
    },

    #[error("unsupported address type in response {address_type:#04x}")]
    InvalidAddressTypeInResponse {
        version: u8,
        reply: Reply,
        address_type: u8,
    },
}

impl From<ProtocolError> for IoError {
    fn from(err: ProtocolError) -> Self {
        IoError::other(err)
    }
}

/// Converging error type returned by every read/write function in this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Io(#[from] IoError),
}

impl From<Error> for IoError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            err => IoError::other(err),
        }
    }
}
