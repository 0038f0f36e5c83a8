use crate::error::Result;

pub mod memory;
pub mod tcp;
pub mod unix;

pub use self::memory::MemoryTransport;
pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{UnixTransport, UnixTransportBuilder, UnixTransportListener};

/// Sending half of a split transport
#[async_trait::async_trait]
pub trait TransportSender: Send {
    /// Send one frame
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Stop sending; the peer observes end of stream
    async fn close(&mut self) -> Result<()>;
}

/// Receiving half of a split transport
#[async_trait::async_trait]
pub trait TransportReceiver: Send {
    /// Receive one frame
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Transport trait for sending and receiving raw bytes
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;

    /// Separate the two directions so they can be driven from different tasks
    fn split(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>);
}

/// Accepts incoming connections as transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport + 'static;

    /// Wait for the next incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}
