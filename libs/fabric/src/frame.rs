//! Length-prefix framing shared by every stream transport
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::transport::{TransportReceiver, TransportSender};

/// Largest frame accepted in either direction (100MB)
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

fn map_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

/// Reads length-prefixed frames from a byte stream
pub struct FrameReader<R> {
    inner: R,
    timeout: Option<Duration>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            timeout: None,
            max_len: MAX_FRAME_LEN,
        }
    }

    /// Fail a read that takes longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lower the frame size cap
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.min(MAX_FRAME_LEN);
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Read one complete frame
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let max_len = self.max_len;
        let inner = &mut self.inner;
        let read_op = async move {
            let len = inner.read_u32().await.map_err(map_eof)? as usize;

            if len > max_len {
                return Err(Error::InvalidFrame(format!(
                    "Message too large: {} bytes",
                    len
                )));
            }

            let mut buf = vec![0u8; len];
            inner.read_exact(&mut buf).await.map_err(map_eof)?;
            Ok::<Vec<u8>, Error>(buf)
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, read_op)
                .await
                .map_err(|_| Error::Timeout("Receive"))?,
            None => read_op.await,
        }
    }
}

/// Writes length-prefixed frames to a byte stream
pub struct FrameWriter<W> {
    inner: W,
    timeout: Option<Duration>,
    max_len: usize,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            timeout: None,
            max_len: MAX_FRAME_LEN,
        }
    }

    /// Fail a write that takes longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lower the frame size cap
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.min(MAX_FRAME_LEN);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Write one complete frame and flush it
    pub async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.max_len {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                bytes.len()
            )));
        }

        let inner = &mut self.inner;
        let write_op = async move {
            inner.write_u32(bytes.len() as u32).await?;
            inner.write_all(bytes).await?;
            inner.flush().await?;
            Ok::<(), Error>(())
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, write_op)
                .await
                .map_err(|_| Error::Timeout("Send"))?,
            None => write_op.await,
        }
    }

    /// Shut down the write side of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> TransportReceiver for FrameReader<R> {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        self.read_frame().await
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> TransportSender for FrameWriter<W> {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_frame(bytes).await
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown().await
    }
}
