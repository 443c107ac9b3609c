use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Cursor, Error as IoError},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::io::{AsyncRead, AsyncReadExt};

/// A SOCKS5 `DST.ADDR`/`BND.ADDR` — either a literal socket address or an
/// unresolved domain name plus port.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Address {
    SocketAddress(SocketAddr),
    DomainAddress(String, u16),
}

/// Error produced while parsing an [`Address`] off the wire.
///
/// Kept distinct from [`crate::Error`] so callers (the request/response
/// parsers) can attach the `ATYP` byte to the right `ProtocolError`
/// variant for their own framing.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("unsupported address type {0:#04x}")]
    UnsupportedType(u8),
    #[error("invalid domain name encoding: {0}")]
    InvalidEncoding(#[from] std::string::FromUtf8Error),
}

impl Address {
    const ATYP_IPV4: u8 = 0x01;
    const ATYP_FQDN: u8 = 0x03;
    const ATYP_IPV6: u8 = 0x04;

    pub fn unspecified() -> Self {
        Address::SocketAddress(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
    }

    /// Resolves a literal address to a [`SocketAddr`] without touching DNS.
    ///
    /// Returns `None` for domain names — those must go through a resolver.
    pub fn as_socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Address::SocketAddress(addr) => Some(*addr),
            Address::DomainAddress(..) => None,
        }
    }

    pub async fn read_from<R>(stream: &mut R) -> Result<Self, AddressError>
    where
        R: AsyncRead + Unpin,
    {
        let atyp = stream.read_u8().await?;

        match atyp {
            Self::ATYP_IPV4 => {
                let mut buf = [0; 6];
                stream.read_exact(&mut buf).await?;
                let mut rdr = Cursor::new(buf);

                let addr = Ipv4Addr::new(
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                    ReadBytesExt::read_u8(&mut rdr).unwrap(),
                );
                let port = ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap();

                Ok(Self::SocketAddress(SocketAddr::from((addr, port))))
            }
            Self::ATYP_FQDN => {
                let len = stream.read_u8().await? as usize;

                let mut buf = vec![0; len + 2];
                stream.read_exact(&mut buf).await?;

                let port = ReadBytesExt::read_u16::<BigEndian>(&mut &buf[len..]).unwrap();
                buf.truncate(len);

                let addr = String::from_utf8(buf)?;

                Ok(Self::DomainAddress(addr, port))
            }
            Self::ATYP_IPV6 => {
                let mut buf = [0; 18];
                stream.read_exact(&mut buf).await?;
                let mut rdr = Cursor::new(buf);

                let addr = Ipv6Addr::new(
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                    ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap(),
                );
                let port = ReadBytesExt::read_u16::<BigEndian>(&mut rdr).unwrap();

                Ok(Self::SocketAddress(SocketAddr::from((addr, port))))
            }
            atyp => Err(AddressError::UnsupportedType(atyp)),
        }
    }

    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        match self {
            Self::SocketAddress(addr) => match addr {
                SocketAddr::V4(addr) => {
                    buf.put_u8(Self::ATYP_IPV4);
                    buf.put_slice(&addr.ip().octets());
                    buf.put_u16(addr.port());
                }
                SocketAddr::V6(addr) => {
                    buf.put_u8(Self::ATYP_IPV6);
                    for seg in addr.ip().segments() {
                        buf.put_u16(seg);
                    }
                    buf.put_u16(addr.port());
                }
            },
            Self::DomainAddress(addr, port) => {
                buf.put_u8(Self::ATYP_FQDN);
                buf.put_u8(addr.len() as u8);
                buf.put_slice(addr.as_bytes());
                buf.put_u16(*port);
            }
        }
    }

    pub fn serialized_len(&self) -> usize {
        1 + match self {
            Address::SocketAddress(addr) => match addr {
                SocketAddr::V4(_) => 6,
                SocketAddr::V6(_) => 18,
            },
            Address::DomainAddress(addr, _) => 1 + addr.len() + 2,
        }
    }

    pub const fn max_serialized_len() -> usize {
        1 + 1 + u8::MAX as usize + 2
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Address::DomainAddress(hostname, port) => write!(f, "{hostname}:{port}"),
            Address::SocketAddress(socket_addr) => write!(f, "{socket_addr}"),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::SocketAddress(addr)
    }
}

impl From<(Ipv4Addr, u16)> for Address {
    fn from((addr, port): (Ipv4Addr, u16)) -> Self {
        Address::SocketAddress(SocketAddr::from((addr, port)))
    }
}

impl From<(Ipv6Addr, u16)> for Address {
    fn from((addr, port): (Ipv6Addr, u16)) -> Self {
        Address::SocketAddress(SocketAddr::from((addr, port)))
    }
}

impl From<(String, u16)> for Address {
    fn from((addr, port): (String, u16)) -> Self {
        Address::DomainAddress(addr, port)
    }
}

impl From<(&str, u16)> for Address {
    fn from((addr, port): (&str, u16)) -> Self {
        Address::DomainAddress(addr.to_owned(), port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as StdCursor;

    #[tokio::test]
    async fn round_trips_ipv4() {
        let addr = Address::SocketAddress("127.0.0.1:9".parse().unwrap());
        let mut buf = Vec::new();
        addr.write_to_buf(&mut buf);
        assert_eq!(buf.len(), addr.serialized_len());

        let mut cur = StdCursor::new(buf);
        let parsed = Address::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed, addr);
    }

    #[tokio::test]
    async fn round_trips_ipv6() {
        let addr = Address::SocketAddress("[::1]:443".parse().unwrap());
        let mut buf = Vec::new();
        addr.write_to_buf(&mut buf);

        let mut cur = StdCursor::new(buf);
        let parsed = Address::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed, addr);
    }

    #[tokio::test]
    async fn round_trips_domain() {
        let addr = Address::DomainAddress("example.test".into(), 80);
        let mut buf = Vec::new();
        addr.write_to_buf(&mut buf);

        let mut cur = StdCursor::new(buf);
        let parsed = Address::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed, addr);
    }

    #[tokio::test]
    async fn rejects_unknown_atyp() {
        let mut cur = StdCursor::new(vec![0x7f]);
        let err = Address::read_from(&mut cur).await.unwrap_err();
        assert!(matches!(err, AddressError::UnsupportedType(0x7f)));
    }

    #[tokio::test]
    async fn domain_255_bytes_round_trips() {
        let name: String = "a".repeat(255);
        let addr = Address::DomainAddress(name.clone(), 1);
        let mut buf = Vec::new();
        addr.write_to_buf(&mut buf);
        assert_eq!(buf.len(), 1 + 1 + 255 + 2);

        let mut cur = StdCursor::new(buf);
        let parsed = Address::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed, addr);
    }
}
