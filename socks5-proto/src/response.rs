use crate::{Address, AddressError, Error, ProtocolError, Reply};
use bytes::{BufMut, BytesMut};
use std::io::Error as IoError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// SOCKS5 response
///
/// ```plain
/// +-----+-----+-------+------+----------+----------+
/// | VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +-----+-----+-------+------+----------+----------+
/// |  1  |  1  | X'00' |  1   | Variable |    2     |
/// +-----+-----+-------+------+----------+----------+
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub reply: Reply,
    pub address: Address,
}

impl Response {
    pub fn new(reply: Reply, address: Address) -> Self {
        Self { reply, address }
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

        let reply = Reply::try_from(buf[0]).map_err(|reply| ProtocolError::InvalidReply {
            version: ver,
            reply,
        })?;

        let address = Address::read_from(r).await.map_err(|err| match err {
            AddressError::Io(err) => Error::Io(err),
            AddressError::UnsupportedType(address_type) => {
                ProtocolError::InvalidAddressTypeInResponse {
                    version: ver,
                    reply,
                    address_type,
                }
                .into()
            }
            AddressError::InvalidEncoding(err) => {
                Error::Io(IoError::new(std::io::ErrorKind::InvalidData, err))
            }
        })?;

        Ok(Self { reply, address })
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
        buf.put_u8(u8::from(self.reply));
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
    async fn round_trips_succeeded() {
        let resp = Response::new(
            Reply::Succeeded,
            Address::SocketAddress("93.184.216.34:80".parse().unwrap()),
        );
        let mut buf = Vec::new();
        resp.write_to_buf(&mut buf);

        let mut cur = Cursor::new(buf);
        let parsed = Response::read_from(&mut cur).await.unwrap();
        assert_eq!(parsed.reply, Reply::Succeeded);
        assert_eq!(parsed.address, resp.address);
    }
}
