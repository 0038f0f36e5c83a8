//! Switchboard RPC - name-spaced method binding over fabric transports
//!
//! A [`Protocol`] groups typed handlers under a dotted name such as
//! `keybase.1.loginUi`. Protocols are collected in a [`Registry`], which a
//! [`Dispatcher`] uses to turn an incoming `protocol.method` request into a
//! handler invocation. On the calling side a [`Client`] wraps any
//! [`GenericClient`], usually a [`Connection`].
//!
//! # Example
//!
//! ```no_run
//! use switchboard_core::Context;
//! use switchboard_fabric::codec::BincodeCodec;
//! use switchboard_fabric::transport::MemoryTransport;
//! use switchboard_rpc::{Connection, Method, Protocol, Registry};
//!
//! const PING: Method<i64, i64> = Method::call("svc.echo", "ping");
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry: Registry<BincodeCodec> = Registry::new();
//! registry.register(Protocol::new("svc.echo").handle(&PING, |_ctx, n: i64| async move { Ok(n) }));
//!
//! let (a, b) = MemoryTransport::pair();
//! let _server = Connection::builder(BincodeCodec).registry(registry).spawn(a);
//! let client = Connection::new(b, BincodeCodec).client();
//!
//! let n = client.invoke(&Context::background(), &PING, &7).await?;
//! assert_eq!(n, 7);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod method;
pub mod registry;
pub mod server;

pub use client::{Client, GenericClient};
pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionBuilder, ConnectionStats};
pub use dispatch::Dispatcher;
pub use error::{HandlerError, Result, RpcError};
pub use message::{Message, WireError};
pub use method::{Method, MethodKind};
pub use registry::{MethodDescriptor, Protocol, Registry};
pub use server::Server;
pub use switchboard_core::Context;
