use serde::de::DeserializeOwned;
use serde::Serialize;
use switchboard_core::Context;
use switchboard_fabric::Codec;

use crate::error::{Result, RpcError};
use crate::method::{Method, MethodKind};

/// Byte-level call primitive a [`Client`] delegates to
///
/// Implementations own request correlation, framing and delivery. They see
/// arguments and results only as encoded bytes.
#[async_trait::async_trait]
pub trait GenericClient: Send + Sync {
    /// Send a request and wait for its encoded result
    async fn call(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<Vec<u8>>;

    /// Send a request without waiting for anything but delivery to the transport
    async fn notify(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: GenericClient + ?Sized> GenericClient for std::sync::Arc<T> {
    async fn call(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<Vec<u8>> {
        (**self).call(ctx, method, args).await
    }

    async fn notify(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<()> {
        (**self).notify(ctx, method, args).await
    }
}

/// Typed calling side of a protocol
///
/// Encodes the argument as a one-element list, hands it to the underlying
/// [`GenericClient`], and decodes the result. Failures from the transport are
/// returned untouched; nothing is retried.
#[derive(Debug, Clone)]
pub struct Client<T, C> {
    transport: T,
    codec: C,
}

impl<T: GenericClient, C: Codec> Client<T, C> {
    pub fn new(transport: T, codec: C) -> Self {
        Self { transport, codec }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Call `method` (a dotted `protocol.method` name) and decode its result
    pub async fn call<A, R>(&self, ctx: &Context, method: &str, arg: &A) -> Result<R>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let args = self.encode_args(arg)?;
        let raw = self.transport.call(ctx, method, args).await?;
        Ok(self.codec.decode(&raw)?)
    }

    /// Fire-and-forget `method`
    pub async fn notify<A>(&self, ctx: &Context, method: &str, arg: &A) -> Result<()>
    where
        A: Serialize + ?Sized + Sync,
    {
        let args = self.encode_args(arg)?;
        self.transport.notify(ctx, method, args).await
    }

    /// Call a typed call-kind method
    pub async fn invoke<A, R>(&self, ctx: &Context, method: &Method<A, R>, arg: &A) -> Result<R>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        if method.kind() != MethodKind::Call {
            return Err(RpcError::Internal(format!(
                "{} is notify-only; use send",
                method.qualified_name()
            )));
        }
        self.call(ctx, &method.qualified_name(), arg).await
    }

    /// Fire a typed notify-kind method
    pub async fn send<A>(&self, ctx: &Context, method: &Method<A, ()>, arg: &A) -> Result<()>
    where
        A: Serialize + Sync,
    {
        match method.kind() {
            MethodKind::Notify => self.notify(ctx, &method.qualified_name(), arg).await,
            MethodKind::Call => self.call(ctx, &method.qualified_name(), arg).await,
        }
    }

    fn encode_args<A: Serialize + ?Sized>(&self, arg: &A) -> Result<Vec<u8>> {
        let args: [&A; 1] = [arg];
        Ok(self.codec.encode(&args[..])?)
    }
}
