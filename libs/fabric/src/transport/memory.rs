use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use crate::error::Result;
use crate::frame::{FrameReader, FrameWriter};
use crate::transport::{Transport, TransportReceiver, TransportSender};

const DEFAULT_CAPACITY: usize = 64 * 1024;

/// In-process transport over a tokio duplex pipe
///
/// Uses the same length-prefix framing as the socket transports, so it
/// behaves like a real connection including backpressure.
pub struct MemoryTransport {
    reader: FrameReader<ReadHalf<DuplexStream>>,
    writer: FrameWriter<WriteHalf<DuplexStream>>,
}

impl MemoryTransport {
    /// Create two transports connected to each other
    pub fn pair() -> (Self, Self) {
        Self::pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a connected pair with `capacity` bytes buffered per direction
    pub fn pair_with_capacity(capacity: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(capacity);
        (Self::from_stream(a), Self::from_stream(b))
    }

    fn from_stream(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_frame(bytes).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        self.reader.read_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn split(self: Box<Self>) -> (Box<dyn TransportSender>, Box<dyn TransportReceiver>) {
        (Box::new(self.writer), Box::new(self.reader))
    }
}
