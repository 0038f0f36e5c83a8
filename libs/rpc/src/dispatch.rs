use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use switchboard_core::Context;
use switchboard_fabric::Codec;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};
use crate::method::{qualify, split_qualified, MethodKind};
use crate::registry::Registry;

/// Server-side request execution
///
/// Resolves the method, decodes the payload into its declared shape, runs the
/// handler, and encodes the result. Holds only the shared registry and a
/// codec; cloning is cheap and every dispatch is independent.
pub struct Dispatcher<C> {
    registry: Arc<Registry<C>>,
    codec: C,
}

impl<C: Clone> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            codec: self.codec.clone(),
        }
    }
}

impl<C: Codec> Dispatcher<C> {
    pub fn new(registry: impl Into<Arc<Registry<C>>>, codec: C) -> Self {
        Self {
            registry: registry.into(),
            codec,
        }
    }

    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Run one request
    ///
    /// Returns the encoded result for call-kind methods and `None` for
    /// notify-kind methods. Lookup and decode failures never reach the
    /// handler.
    pub async fn dispatch(
        &self,
        ctx: Context,
        protocol: &str,
        method: &str,
        raw_args: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let descriptor = self.registry.resolve(protocol, method)?;

        let invocation = descriptor
            .prepare(&self.codec, raw_args)
            .map_err(|mismatch| RpcError::ArgumentType {
                method: qualify(protocol, method),
                expected: mismatch.expected,
                received: mismatch.received,
            })?;

        ctx.check()?;

        debug!(%protocol, %method, kind = ?descriptor.kind(), "Dispatching");

        match AssertUnwindSafe(invocation(ctx)).catch_unwind().await {
            Ok(Ok(output)) => Ok(match descriptor.kind() {
                MethodKind::Call => output,
                MethodKind::Notify => None,
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(%protocol, %method, "Handler panicked");
                Err(RpcError::Internal(format!(
                    "handler for {} panicked",
                    qualify(protocol, method)
                )))
            }
        }
    }

    /// Run one request addressed by its dotted `protocol.method` name
    pub async fn dispatch_qualified(
        &self,
        ctx: Context,
        name: &str,
        raw_args: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        match split_qualified(name) {
            Some((protocol, method)) => self.dispatch(ctx, protocol, method, raw_args).await,
            None => Err(RpcError::UnknownMethod {
                protocol: String::new(),
                method: name.to_string(),
            }),
        }
    }
}
