//! # Relay Proxy
//!
//! Sits between Artemis clients and a server. Every client that connects
//! gets its own upstream connection; both directions are decoded, logged
//! and re-encoded.
//!
//! # Architecture
//!
//! ```text
//! client ──[C>S]──> proxy ──> server
//! client <──[C<S]── proxy <── server
//!                     │
//!                     └──> Tracker (server traffic only)
//! ```
//!
//! Each accepted client runs in its own task with one relay per direction.
//! When either side closes or sends something undecodable, both halves of
//! that session are dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use diana_config::ProxyConfig;
use diana_core::{DianaError, Provenance, Result};
use diana_protocol::FrameCodec;
use diana_tracking::Tracker;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Object table shared between relay sessions
pub type SharedTracker = Arc<Mutex<Tracker>>;

/// Which way a relay carries packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// Log prefix for packets travelling this way
    pub fn tag(self) -> &'static str {
        match self {
            Self::ClientToServer => "[C>S]",
            Self::ServerToClient => "[C<S]",
        }
    }

    /// Origin every frame on this leg claims
    pub fn provenance(self) -> Provenance {
        match self {
            Self::ClientToServer => Provenance::Client,
            Self::ServerToClient => Provenance::Server,
        }
    }

    /// Relays pass frames through with their origin unchanged
    fn codec(self) -> FrameCodec {
        FrameCodec::new(self.provenance(), self.provenance())
    }
}

/// Decoding relay between Artemis clients and one server
pub struct Proxy {
    listener: TcpListener,
    server_address: String,
    block_size: usize,
    tracker: Option<SharedTracker>,
}

impl Proxy {
    /// Bind the listen socket
    pub async fn bind(listen: SocketAddr, server_address: impl Into<String>) -> Result<Self> {
        let listener = TcpListener::bind(listen).await.map_err(|e| {
            DianaError::Network(format!("Failed to bind to {}: {}", listen, e))
        })?;
        let server_address = server_address.into();
        tracing::info!(
            "Proxy listening on {}, relaying to {}",
            listener.local_addr()?,
            server_address
        );

        Ok(Self {
            listener,
            server_address,
            block_size: ProxyConfig::default().block_size,
            tracker: None,
        })
    }

    /// Bind using the addresses, block size and tracking flag of `config`
    pub async fn from_config(config: &ProxyConfig) -> Result<Self> {
        let proxy = Self::bind(config.listen_address()?, config.server_address())
            .await?
            .with_block_size(config.block_size);
        Ok(if config.track {
            proxy.with_tracker(SharedTracker::default())
        } else {
            proxy
        })
    }

    /// Initial read buffer capacity for each relay
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Feed server traffic of every session into `tracker`
    pub fn with_tracker(mut self, tracker: SharedTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn tracker(&self) -> Option<&SharedTracker> {
        self.tracker.as_ref()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until the task is cancelled
    pub async fn run(&self) -> Result<()> {
        loop {
            let (client, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    continue;
                }
            };
            tracing::info!("Client connected from {}", addr);

            let server_address = self.server_address.clone();
            let block_size = self.block_size;
            let tracker = self.tracker.clone();
            tokio::spawn(async move {
                match session(client, &server_address, block_size, tracker).await {
                    Ok(()) => tracing::info!("Session for {} closed", addr),
                    Err(e) => tracing::warn!("Session for {} ended: {}", addr, e),
                }
            });
        }
    }
}

/// Relay one client until either side goes away
async fn session(
    client: TcpStream,
    server_address: &str,
    block_size: usize,
    tracker: Option<SharedTracker>,
) -> Result<()> {
    let server = TcpStream::connect(server_address).await.map_err(|e| {
        DianaError::Network(format!("Cannot reach server {}: {}", server_address, e))
    })?;
    client.set_nodelay(true)?;
    server.set_nodelay(true)?;

    let (client_read, client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    tokio::select! {
        result = relay(client_read, server_write, Direction::ClientToServer, block_size, None) => result,
        result = relay(server_read, client_write, Direction::ServerToClient, block_size, tracker) => result,
    }
}

/// Copy packets from `reader` to `writer`, decoding each on the way
///
/// Returns once `reader` reaches end of stream.
pub async fn relay<R, W>(
    reader: R,
    writer: W,
    direction: Direction,
    block_size: usize,
    tracker: Option<SharedTracker>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut incoming = FramedRead::with_capacity(reader, direction.codec(), block_size);
    let mut outgoing = FramedWrite::new(writer, direction.codec());

    while let Some(packet) = incoming.next().await {
        let packet = packet?;
        tracing::info!("{} {:?}", direction.tag(), packet);

        if let Some(tracker) = &tracker {
            tracker.lock().observe(&packet);
        }
        outgoing.send(packet).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diana_protocol::{HeartbeatPacket, Packet, ShipCommand, UndecodedPacket};

    #[test]
    fn test_direction_tags() {
        assert_eq!(Direction::ClientToServer.tag(), "[C>S]");
        assert_eq!(Direction::ServerToClient.tag(), "[C<S]");
        assert_eq!(Direction::ServerToClient.provenance(), Provenance::Server);
    }

    #[tokio::test]
    async fn test_relay_reencodes_stream() {
        let mut wire = diana_protocol::frame::encode(&ShipCommand::Ready.into(), Provenance::Client).unwrap();
        let unknown: Packet = UndecodedPacket::new(0x1234_5678, &[9, 9, 9]).into();
        diana_protocol::frame::encode_into(&unknown, Provenance::Client, &mut wire).unwrap();

        let mut relayed = Vec::new();
        relay(&wire[..], &mut relayed, Direction::ClientToServer, 16, None)
            .await
            .unwrap();
        assert_eq!(relayed, wire.to_vec());
    }

    #[tokio::test]
    async fn test_relay_stops_on_wrong_origin() {
        let wire = diana_protocol::frame::encode(&HeartbeatPacket.into(), Provenance::Server).unwrap();
        let mut relayed = Vec::new();
        let result = relay(&wire[..], &mut relayed, Direction::ClientToServer, 1024, None).await;
        assert!(result.is_err());
        assert!(relayed.is_empty());
    }
}
