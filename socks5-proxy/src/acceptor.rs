//! The top-level accept loop.
//!
//! Binds one listening socket and spawns one [`Session`] per accepted
//! connection. A per-connection accept failure is logged and the loop
//! continues; the listener itself is never torn down by a session's
//! misbehavior (spec §4.2).

use crate::session::Session;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tracing::{debug, error};

pub struct Acceptor {
    listener: TcpListener,
    buffer_size: usize,
    next_session_id: AtomicU64,
}

impl Acceptor {
    pub async fn bind(port: u16, buffer_size: usize) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        Ok(Self {
            listener,
            buffer_size,
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs forever, accepting connections and spawning a [`Session`]
    /// task for each. Never returns under normal operation.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                    debug!(session_id = id, peer = %peer, "accepted connection");
                    let session = Session::new(id, socket, self.buffer_size);
                    tokio::spawn(session.run());
                }
                Err(err) => error!(error = %err, "accept failed"),
            }
        }
    }
}
