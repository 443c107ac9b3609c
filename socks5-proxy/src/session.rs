//! The per-client SOCKS5 protocol state machine and bidirectional relay.
//!
//! A [`Session`] owns exactly one accepted client socket and, once the
//! `CONNECT` negotiation succeeds, exactly one upstream socket and two
//! fixed-size buffers. It drives itself from `READ_GREETING` through
//! `RELAY` to completion as a single `async fn` — each `.await` point
//! below is a suspension point, and any error or unexpected framing is
//! an early return, which is this state machine's `CLOSED`. There is
//! no separate `Phase` field: the position in `run` / `run_inner` *is*
//! the phase.

use crate::error::SessionError;
use socks5_proto::{Address, Command};
use std::{
    io::ErrorKind,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, error, info, warn};

/// `NO AUTHENTICATION REQUIRED`, the only handshake method this server offers.
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_UNACCEPTABLE: u8 = 0xff;

pub struct Session {
    id: u64,
    in_socket: TcpStream,
    buffer_size: usize,
}

impl Session {
    pub fn new(id: u64, in_socket: TcpStream, buffer_size: usize) -> Self {
        Self {
            id,
            in_socket,
            buffer_size,
        }
    }

    /// Drives the session to completion. Never returns an error: every
    /// failure is logged at the site it's detected (spec §7) and simply
    /// ends the session — both sockets close when this future's locals
    /// (and therefore the sockets) drop.
    pub async fn run(mut self) {
        if let Err(err) = self.run_inner().await {
            error!(session_id = self.id, error = %err, "session closed");
        }
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        let mut in_buf = vec![0u8; self.buffer_size];

        if !self.read_greeting(&mut in_buf).await? {
            self.write_greeting(&in_buf).await?;
            return Err(SessionError::Protocol(
                "no acceptable handshake method".into(),
            ));
        }
        self.write_greeting(&in_buf).await?;

        let (command, address) = self.read_request(&mut in_buf).await?;
        if command != Command::Connect {
            return Err(SessionError::Protocol(format!(
                "unsupported command {command:?}"
            )));
        }

        let (remote_host, remote_port) = host_port(&address);

        let candidates = resolve(&address, &remote_host, &remote_port).await?;
        let out_socket = connect(&candidates, &remote_host, &remote_port).await?;

        info!(
            session_id = self.id,
            host = %remote_host,
            port = %remote_port,
            upstream = %out_socket.peer_addr().map_err(SessionError::protocol_io)?,
            "connected to upstream"
        );

        self.write_reply(
            &mut in_buf,
            out_socket.peer_addr().map_err(SessionError::protocol_io)?,
        )
        .await?;

        let mut out_buf = vec![0u8; self.buffer_size];
        self.relay(out_socket, &mut in_buf, &mut out_buf).await;

        Ok(())
    }

    /// `READ_GREETING`. Issues exactly one receive and parses it
    /// defensively: `NMETHODS` is trusted only up to the bytes actually
    /// received, never used to size a further read (spec §4.1, §9).
    async fn read_greeting(&mut self, in_buf: &mut [u8]) -> Result<bool, SessionError> {
        let length = self
            .in_socket
            .read(in_buf)
            .await
            .map_err(SessionError::protocol_io)?;

        if length < 3 || in_buf[0] != socks5_proto::SOCKS_VERSION {
            return Err(SessionError::Protocol(format!(
                "malformed greeting ({length} bytes, version {:#04x})",
                in_buf.first().copied().unwrap_or(0)
            )));
        }

        let nmethods = in_buf[1] as usize;
        let scan_end = (2 + nmethods).min(length);
        let accepted = in_buf[2..scan_end].contains(&METHOD_NO_AUTH);

        in_buf[1] = if accepted {
            METHOD_NO_AUTH
        } else {
            METHOD_UNACCEPTABLE
        };
        Ok(accepted)
    }

    /// `WRITE_GREETING`. Writes exactly the two method-negotiation bytes.
    async fn write_greeting(&mut self, in_buf: &[u8]) -> Result<(), SessionError> {
        self.in_socket
            .write_all(&in_buf[..2])
            .await
            .map_err(SessionError::protocol_io)
    }

    /// `READ_REQUEST`. Issues exactly one receive and parses the
    /// `CONNECT` request header per the ATYP table in spec §4.1.
    async fn read_request(
        &mut self,
        in_buf: &mut [u8],
    ) -> Result<(Command, Address), SessionError> {
        let length = self
            .in_socket
            .read(in_buf)
            .await
            .map_err(SessionError::protocol_io)?;

        if length < 5 || in_buf[0] != socks5_proto::SOCKS_VERSION {
            return Err(SessionError::Protocol(format!(
                "malformed request ({length} bytes)"
            )));
        }

        let command = Command::try_from(in_buf[1])
            .map_err(|code| SessionError::Protocol(format!("unsupported command {code:#04x}")))?;

        let atyp = in_buf[3];
        let address = match atyp {
            0x01 => {
                if length != 10 {
                    return Err(SessionError::Protocol(format!(
                        "IPv4 request length mismatch ({length} bytes)"
                    )));
                }
                let ip = Ipv4Addr::new(in_buf[4], in_buf[5], in_buf[6], in_buf[7]);
                let port = u16::from_be_bytes([in_buf[8], in_buf[9]]);
                Address::SocketAddress(SocketAddr::from((ip, port)))
            }
            0x03 => {
                let name_len = in_buf[4] as usize;
                let expected = 5 + name_len + 2;
                if length != expected {
                    return Err(SessionError::Protocol(format!(
                        "domain request length mismatch (expected {expected}, got {length})"
                    )));
                }
                let name = std::str::from_utf8(&in_buf[5..5 + name_len])
                    .map_err(|err| SessionError::Protocol(format!("invalid domain name: {err}")))?
                    .to_owned();
                let port = u16::from_be_bytes([in_buf[5 + name_len], in_buf[6 + name_len]]);
                Address::DomainAddress(name, port)
            }
            0x04 => {
                if length != 22 {
                    return Err(SessionError::Protocol(format!(
                        "IPv6 request length mismatch ({length} bytes)"
                    )));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&in_buf[4..20]);
                let port = u16::from_be_bytes([in_buf[20], in_buf[21]]);
                Address::SocketAddress(SocketAddr::from((Ipv6Addr::from(octets), port)))
            }
            other => {
                return Err(SessionError::Protocol(format!(
                    "unsupported address type {other:#04x}"
                )))
            }
        };

        Ok((command, address))
    }

    /// `WRITE_REPLY`. Populates `in_buf` with the SOCKS5 success reply,
    /// reporting `out_socket`'s remote peer as `BND.ADDR`/`BND.PORT` —
    /// a deliberate, preserved deviation from the strict RFC 1928
    /// reading (spec §4.1, "BND.ADDR/BND.PORT semantics").
    async fn write_reply(
        &mut self,
        in_buf: &mut [u8],
        upstream_peer: SocketAddr,
    ) -> Result<(), SessionError> {
        in_buf[0] = socks5_proto::SOCKS_VERSION;
        in_buf[1] = 0x00; // REP: succeeded
        in_buf[2] = 0x00; // RSV

        let len = match upstream_peer {
            SocketAddr::V4(addr) => {
                in_buf[3] = 0x01;
                in_buf[4..8].copy_from_slice(&addr.ip().octets());
                in_buf[8..10].copy_from_slice(&addr.port().to_be_bytes());
                10
            }
            SocketAddr::V6(addr) => {
                in_buf[3] = 0x04;
                in_buf[4..20].copy_from_slice(&addr.ip().octets());
                in_buf[20..22].copy_from_slice(&addr.port().to_be_bytes());
                22
            }
        };

        self.in_socket
            .write_all(&in_buf[..len])
            .await
            .map_err(SessionError::protocol_io)
    }

    /// `RELAY`. Splits both sockets and runs two independent half-duplex
    /// pumps concurrently. Per spec §4.1, any error or EOF on either
    /// pump ends the session immediately: `tokio::select!` drives both
    /// futures and drops whichever hasn't finished, which drops its
    /// socket halves and closes both sockets — the peer direction is
    /// never given a chance to drain.
    async fn relay(&mut self, mut out_socket: TcpStream, in_buf: &mut [u8], out_buf: &mut [u8]) {
        let (in_read, in_write) = self.in_socket.split();
        let (out_read, out_write) = out_socket.split();

        let id = self.id;
        let client_to_upstream = pump(in_read, out_write, in_buf, "client->upstream", id);
        let upstream_to_client = pump(out_read, in_write, out_buf, "upstream->client", id);

        tokio::select! {
            outcome = client_to_upstream => log_pump_end("client->upstream", outcome, id),
            outcome = upstream_to_client => log_pump_end("upstream->client", outcome, id),
        }
    }
}

fn host_port(address: &Address) -> (String, String) {
    match address {
        Address::SocketAddress(addr) => (addr.ip().to_string(), addr.port().to_string()),
        Address::DomainAddress(host, port) => (host.clone(), port.to_string()),
    }
}

async fn resolve(
    address: &Address,
    host: &str,
    port: &str,
) -> Result<Vec<SocketAddr>, SessionError> {
    match address {
        Address::SocketAddress(addr) => Ok(vec![*addr]),
        Address::DomainAddress(domain, domain_port) => {
            tokio::net::lookup_host((domain.as_str(), *domain_port))
                .await
                .map(Iterator::collect)
                .map_err(|source| SessionError::Resolve {
                    host: host.to_owned(),
                    port: port.to_owned(),
                    source,
                })
        }
    }
}

async fn connect(
    candidates: &[SocketAddr],
    host: &str,
    port: &str,
) -> Result<TcpStream, SessionError> {
    let mut last_err = None;

    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(candidate = %candidate, error = %err, "upstream candidate refused");
                last_err = Some(err);
            }
        }
    }

    Err(SessionError::Connect {
        host: host.to_owned(),
        port: port.to_owned(),
        source: last_err
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no candidates resolved")),
    })
}

enum PumpOutcome {
    Eof,
    Io(std::io::Error),
}

/// One directional relay loop: receive into `buf`, write what was
/// received, repeat. The next receive is only issued after the write
/// completes, so a slow writer naturally backpressures its reader
/// (spec §5, "Backpressure") — there is never more than one
/// outstanding read or write per socket (spec §3 invariant 2).
async fn pump(
    mut read_half: tokio::net::tcp::ReadHalf<'_>,
    mut write_half: tokio::net::tcp::WriteHalf<'_>,
    buf: &mut [u8],
    direction: &str,
    session_id: u64,
) -> PumpOutcome {
    loop {
        let n = match read_half.read(buf).await {
            Ok(0) => return PumpOutcome::Eof,
            Ok(n) => n,
            Err(err) => return PumpOutcome::Io(err),
        };

        debug!(session_id, direction, bytes = n, "relayed chunk");

        if let Err(err) = write_half.write_all(&buf[..n]).await {
            return PumpOutcome::Io(err);
        }
    }
}

fn log_pump_end(direction: &str, outcome: PumpOutcome, session_id: u64) {
    match outcome {
        PumpOutcome::Eof => info!(session_id, direction, "peer closed connection"),
        PumpOutcome::Io(err) => warn!(session_id, direction, error = %err, "relay I/O error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accepted, connected) =
            tokio::join!(async { listener.accept().await.unwrap().0 }, async {
                connect.await.unwrap()
            });
        (accepted, connected)
    }

    #[tokio::test]
    async fn rejects_wrong_version() {
        let (server, mut client) = loopback_pair().await;
        let handle = tokio::spawn(Session::new(1, server, 256).run());

        client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

        let mut buf = [0u8; 8];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "no reply is sent for a malformed greeting");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn selects_no_auth_when_offered() {
        let (server, mut client) = loopback_pair().await;
        let _handle = tokio::spawn(Session::new(1, server, 256).run());

        client.write_all(&[0x05, 0x02, 0x01, 0x00]).await.unwrap();

        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn no_acceptable_method_replies_and_closes() {
        let (server, mut client) = loopback_pair().await;
        let handle = tokio::spawn(Session::new(1, server, 256).run());

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();

        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x05, 0xff]);

        let mut rest = [0u8; 1];
        assert_eq!(client.read(&mut rest).await.unwrap(), 0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_command_closes_without_reply() {
        let (server, mut client) = loopback_pair().await;
        let handle = tokio::spawn(Session::new(1, server, 256).run());

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut greeting_reply = [0u8; 2];
        client.read_exact(&mut greeting_reply).await.unwrap();

        // BIND, IPv4, 127.0.0.1:80 — a well-formed request the server still refuses.
        client
            .write_all(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();

        let mut rest = [0u8; 1];
        assert_eq!(client.read(&mut rest).await.unwrap(), 0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn connects_to_ipv4_literal_and_relays() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut conn, _) = upstream.accept().await.unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
            conn.write_all(b"world").await.unwrap();
        });

        let (server, mut client) = loopback_pair().await;
        let handle = tokio::spawn(Session::new(1, server, 256).run());

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut greeting_reply = [0u8; 2];
        client.read_exact(&mut greeting_reply).await.unwrap();
        assert_eq!(greeting_reply, [0x05, 0x00]);

        assert_eq!(
            upstream_addr.ip(),
            std::net::IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        let mut request = vec![0x05, 0x01, 0x00, 0x01];
        request.extend_from_slice(&Ipv4Addr::LOCALHOST.octets());
        request.extend_from_slice(&upstream_addr.port().to_be_bytes());
        client.write_all(&request).await.unwrap();

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 0x05);
        assert_eq!(reply[1], 0x00);

        client.write_all(b"hello").await.unwrap();
        let mut response = [0u8; 5];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(&response, b"world");

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn resolution_failure_closes_without_reply() {
        let (server, mut client) = loopback_pair().await;
        let handle = tokio::spawn(Session::new(1, server, 256).run());

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut greeting_reply = [0u8; 2];
        client.read_exact(&mut greeting_reply).await.unwrap();

        let domain = b"this-domain-does-not-resolve.invalid";
        let mut request = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
        request.extend_from_slice(domain);
        request.extend_from_slice(&80u16.to_be_bytes());
        client.write_all(&request).await.unwrap();

        let mut rest = [0u8; 1];
        assert_eq!(client.read(&mut rest).await.unwrap(), 0);
        handle.await.unwrap();
    }
}
