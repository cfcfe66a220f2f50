//! # Server Connection
//!
//! A client's view of one Artemis server: packets go out with client
//! provenance and come back with server provenance.
//!
//! ```rust,no_run
//! use diana_network::Client;
//! use diana_protocol::ShipCommand;
//!
//! # async fn run() -> diana_core::Result<()> {
//! let mut client = Client::connect("127.0.0.1", 2010).await?;
//! client.send(ShipCommand::Ready.into()).await?;
//! while let Some(packet) = client.next_packet().await? {
//!     println!("{:?}", packet);
//! }
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use diana_core::Result;
use diana_protocol::{FrameCodec, Packet};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// Framed TCP connection to a server
#[derive(Debug)]
pub struct Client {
    framed: Framed<TcpStream, FrameCodec>,
    peer_addr: SocketAddr,
}

impl Client {
    /// Dial `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        tracing::info!("Connected to {}:{}", host, port);
        Self::from_stream(stream)
    }

    /// Wrap an already connected socket
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::client()),
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Encode one packet and flush it to the server
    pub async fn send(&mut self, packet: Packet) -> Result<()> {
        tracing::trace!("Sending {} to {}", packet.name(), self.peer_addr);
        self.framed.send(packet).await
    }

    /// Wait for the next complete packet
    ///
    /// Returns `Ok(None)` once the server closes the connection.
    pub async fn next_packet(&mut self) -> Result<Option<Packet>> {
        self.framed.next().await.transpose()
    }
}
