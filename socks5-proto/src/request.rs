use crate::{Address, AddressError, Command, Error, ProtocolError};
use bytes::{BufMut, BytesMut};
use std::io::Error as IoError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// SOCKS5 request
///
/// ```plain
/// +-----+-----+-------+------+----------+----------+
/// | VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +-----+-----+-------+------+----------+----------+
/// |  1  |  1  | X'00' |  1   | Variable |    2     |
/// +-----+-----+-------+------+----------+----------+
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    pub command: Command,
    pub address: Address,
}

impl Request {
    pub fn new(command: Command, address: Address) -> Self {
        Self { command, address }
    }

    pub async fn read_from<R>(r: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let ver = r.read_u8().await?;
        if ver != crate::SOCKS_VERSION {
            return Err(ProtocolError::ProtocolVersion { version: ver }.into());
        }

        let mut buf = [0; 2];
        r.read_exact(&mut buf).await?;

        let command =
            Command::try_from(buf[0]).map_err(|command| ProtocolError::InvalidCommand {
                version: ver,
                command,
            })?;

        let address = Address::read_from(r).await.map_err(|err| match err {
            AddressError::Io(err) => Error::Io(err),
            AddressError::UnsupportedType(address_type) => {
                ProtocolError::InvalidAddressTypeInRequest {
                    version: ver,
                    command,
                    address_type,
                }
                .into()
            }
            AddressError::InvalidEncoding(err) => {
                Error::Io(IoError::new(std::io::ErrorKind::InvalidData, err))
            }
        })?;

        Ok(Self { command, address })
    }

    pub async fn write_to<W>(&self, w: &mut W) -> Result<(), IoError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.write_to_buf(&mut buf);
        w.write_all(&buf).await
    }

    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(crate::SOCKS_VERSION);
        buf.put_u8(u8::from(self.command));
        buf.put_u8(0x00);
        self.address.write_to_buf(buf);
    }

    pub fn serialized_len(&self) -> usize {
        3 + self.address.serialized_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_connect() {
        let req = Request::new(
            Command::Connect,
            Address::SocketAddress("127.0.0.1:9".parse().unwrap()),
        );
        let mut buf = Vec::new();
        req.write_to_buf(&mut buf);

        let mut cur = Cursor::new(buf);
        let parsed = Request::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed.command, Command::Connect);
        assert_eq!(parsed.address, req.address);
    }

    #[tokio::test]
    async fn rejects_wrong_version() {
        let mut cur = Cursor::new(vec![0x04, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0, 9]);
        let err = Request::read_from(&mut cur).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::ProtocolVersion { version: 0x04 })
        ));
    }

    #[tokio::test]
    async fn decodes_bind_command_without_error() {
        // The wire format recognizes BIND; whether the server acts on it
        // is a policy decision made above this crate.
        let mut cur = Cursor::new(vec![0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 9]);
        let parsed = Request::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed.command, Command::Bind);
    }

    #[tokio::test]
    async fn rejects_unknown_command_byte() {
        let mut cur = Cursor::new(vec![0x05, 0x7f, 0x00, 0x01, 127, 0, 0, 1, 0, 9]);
        let err = Request::read_from(&mut cur).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::InvalidCommand { command: 0x7f, .. })
        ));
    }
}
