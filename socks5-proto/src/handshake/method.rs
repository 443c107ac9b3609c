use std::fmt::{Display, Formatter, Result as FmtResult};

/// A SOCKS5 handshake method byte.
///
/// Modeled as a transparent newtype rather than a closed enum because
/// RFC 1928 reserves the space `0x03..=0x7f` for IANA assignment and
/// `0x80..=0xfe` for private methods — a server may see method bytes
/// it doesn't recognize and must still echo them back verbatim if it
/// doesn't pick them.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Method(pub u8);

impl Method {
    pub const NONE: Self = Self(0x00);
    pub const GSSAPI: Self = Self(0x01);
    pub const PASSWORD: Self = Self(0x02);
    pub const UNACCEPTABLE: Self = Self(0xff);
}

impl From<u8> for Method {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<Method> for u8 {
    fn from(value: Method) -> Self {
        value.0
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:#04x}", self.0)
    }
}
