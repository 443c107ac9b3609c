//! Wire-level types for the RFC 1928 SOCKS5 protocol: addresses, the
//! request/response headers, and the method-negotiation handshake.
//!
//! This crate only knows how to read and write bytes; it has no notion
//! of a listener, a session, or a relay. See the `socks5-proxy` crate
//! for the server built on top of it.

mod address;
mod command;
mod error;
mod reply;
mod request;
mod response;

pub mod handshake;

pub use self::{
    address::{Address, AddressError},
    command::Command,
    error::{Error, ProtocolError},
    reply::Reply,
    request::Request,
    response::Response,
};

pub const SOCKS_VERSION: u8 = 0x05;
