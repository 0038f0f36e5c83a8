use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::Result;
use crate::transport::{
    TcpTransport, Transport, TransportReceiver, TransportSender, UnixTransport,
};

/// High-level channel for bidirectional communication
///
/// Combines a transport and codec for persistent connections
pub struct Channel<C> {
    transport: Box<dyn Transport>,
    codec: C,
}

impl<C: Codec> Channel<C> {
    /// Create a channel from an existing transport
    pub fn from_transport(transport: impl Transport + 'static, codec: C) -> Self {
        Self::from_boxed(Box::new(transport), codec)
    }

    /// Create a channel from an already boxed transport
    pub fn from_boxed(transport: Box<dyn Transport>, codec: C) -> Self {
        Self { transport, codec }
    }

    /// Open a TCP channel
    pub async fn tcp(addr: SocketAddr, codec: C) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Open a Unix socket channel
    pub async fn unix(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        let transport = UnixTransport::connect(path).await?;
        Ok(Self::from_transport(transport, codec))
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Send a message over the channel
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.transport.send(&bytes).await
    }

    /// Receive a message from the channel
    pub async fn receive<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T> {
        let bytes = self.transport.receive().await?;
        self.codec.decode(&bytes)
    }

    /// Split into halves that can be owned by different tasks
    pub fn split(self) -> (ChannelSender<C>, ChannelReceiver<C>) {
        let (sender, receiver) = self.transport.split();
        (
            ChannelSender {
                sender,
                codec: self.codec.clone(),
            },
            ChannelReceiver {
                receiver,
                codec: self.codec,
            },
        )
    }

    /// Close the channel
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}

/// Sending half of a [`Channel`]
pub struct ChannelSender<C> {
    sender: Box<dyn TransportSender>,
    codec: C,
}

impl<C: Codec> ChannelSender<C> {
    /// Encode and send a message
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.sender.send(&bytes).await
    }

    /// Close the sending direction
    pub async fn close(&mut self) -> Result<()> {
        self.sender.close().await
    }
}

/// Receiving half of a [`Channel`]
pub struct ChannelReceiver<C> {
    receiver: Box<dyn TransportReceiver>,
    codec: C,
}

impl<C: Codec> ChannelReceiver<C> {
    /// Receive and decode a message
    pub async fn receive<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T> {
        let bytes = self.receiver.receive().await?;
        self.codec.decode(&bytes)
    }
}
