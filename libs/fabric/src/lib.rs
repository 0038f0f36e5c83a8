//! Switchboard Fabric - transport and codec layer
//!
//! Provides framed transport abstractions (TCP, Unix sockets, in-memory
//! pipes) and codecs (bincode, JSON) that the RPC layer runs on top of. This
//! crate knows nothing about methods or protocols; it moves typed messages.
//!
//! # Example
//!
//! ```no_run
//! use switchboard_fabric::{Channel, codec::BincodeCodec};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Ping { seq: u64 }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "127.0.0.1:8080".parse()?;
//! let mut channel = Channel::tcp(addr, BincodeCodec).await?;
//! channel.send(&Ping { seq: 1 }).await?;
//! let pong: Ping = channel.receive().await?;
//!
//! // Drive each direction from its own task
//! let (mut tx, mut rx) = channel.split();
//! tx.send(&Ping { seq: pong.seq + 1 }).await?;
//! let _: Ping = rx.receive().await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod frame;
pub mod transport;

// Re-exports for convenience
pub use channel::{Channel, ChannelReceiver, ChannelSender};
pub use codec::Codec;
pub use error::{Error, Result};
