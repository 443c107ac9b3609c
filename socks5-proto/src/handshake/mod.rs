//! The SOCKS5 method-negotiation handshake that precedes every request.

mod method;
mod request;
mod response;

pub use self::{method::Method, request::Request, response::Response};
