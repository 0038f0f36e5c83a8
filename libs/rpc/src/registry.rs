//! Protocol registration and method lookup
//!
//! A [`Protocol`] is a named table of methods. Each method is stored as a
//! [`MethodDescriptor`]: the argument type it decodes into, the handler, and
//! whether it is a call or a notification. Handlers are typed at
//! registration; the descriptor erases the types behind a checked decode step
//! so the [`Registry`] can hold every protocol in one map.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use switchboard_core::Context;
use switchboard_fabric::Codec;
use tracing::{debug, warn};

use crate::error::{HandlerError, Result, RpcError};
use crate::method::{split_qualified, Method, MethodKind};

/// A decoded request, ready to run
pub(crate) type Invocation =
    Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<Option<Vec<u8>>>> + Send>;

/// Why a payload did not fit the declared argument shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub expected: String,
    pub received: String,
}

trait ErasedMethod<C>: Send + Sync {
    /// Decode `raw` into the handler's argument type and bind it
    fn prepare(&self, codec: &C, raw: &[u8]) -> std::result::Result<Invocation, ShapeMismatch>;
}

struct TypedMethod<A, R, F> {
    handler: Arc<F>,
    kind: MethodKind,
    _marker: std::marker::PhantomData<fn(A) -> R>,
}

impl<C, A, R, F, Fut> ErasedMethod<C> for TypedMethod<A, R, F>
where
    C: Codec,
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(Context, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
{
    fn prepare(&self, codec: &C, raw: &[u8]) -> std::result::Result<Invocation, ShapeMismatch> {
        let arg = decode_single_arg::<C, A>(codec, raw)?;
        let handler = Arc::clone(&self.handler);
        let codec = codec.clone();
        let kind = self.kind;

        let invocation: Invocation =
            Box::new(move |ctx: Context| -> BoxFuture<'static, Result<Option<Vec<u8>>>> {
                Box::pin(invoke_typed(handler, codec, kind, ctx, arg))
            });
        Ok(invocation)
    }
}

async fn invoke_typed<C, A, R, F, Fut>(
    handler: Arc<F>,
    codec: C,
    kind: MethodKind,
    ctx: Context,
    arg: A,
) -> Result<Option<Vec<u8>>>
where
    C: Codec,
    R: Serialize,
    F: Fn(Context, A) -> Fut,
    Fut: Future<Output = std::result::Result<R, HandlerError>>,
{
    let value = handler(ctx, arg).await?;
    match kind {
        MethodKind::Call => Ok(Some(codec.encode(&value)?)),
        MethodKind::Notify => Ok(None),
    }
}

/// Arguments travel as a one-element list; the handler gets element 0
fn decode_single_arg<C: Codec, A: DeserializeOwned>(
    codec: &C,
    raw: &[u8],
) -> std::result::Result<A, ShapeMismatch> {
    let expected = format!("[{}; 1]", type_name::<A>());
    let args: Vec<A> = codec.decode(raw).map_err(|e| ShapeMismatch {
        expected: expected.clone(),
        received: format!("{} payload of {} bytes ({})", codec.name(), raw.len(), e),
    })?;

    let [arg] = <[A; 1]>::try_from(args).map_err(|args| ShapeMismatch {
        expected,
        received: format!("{} arguments", args.len()),
    })?;
    Ok(arg)
}

/// Registered shape, handler and kind for one method
pub struct MethodDescriptor<C> {
    kind: MethodKind,
    arg_shape: &'static str,
    result_shape: &'static str,
    method: Arc<dyn ErasedMethod<C>>,
}

impl<C> Clone for MethodDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            arg_shape: self.arg_shape,
            result_shape: self.result_shape,
            method: Arc::clone(&self.method),
        }
    }
}

impl<C> fmt::Debug for MethodDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("kind", &self.kind)
            .field("arg_shape", &self.arg_shape)
            .field("result_shape", &self.result_shape)
            .finish()
    }
}

impl<C: Codec> MethodDescriptor<C> {
    fn new<A, R, F, Fut>(kind: MethodKind, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Context, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
    {
        Self {
            kind,
            arg_shape: type_name::<A>(),
            result_shape: type_name::<R>(),
            method: Arc::new(TypedMethod {
                handler: Arc::new(handler),
                kind,
                _marker: std::marker::PhantomData,
            }),
        }
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Type name of the argument this method decodes into
    pub fn arg_shape(&self) -> &'static str {
        self.arg_shape
    }

    pub fn result_shape(&self) -> &'static str {
        self.result_shape
    }

    /// Decode `raw` against the declared shape
    ///
    /// The handler is not run until the returned invocation is awaited.
    pub(crate) fn prepare(
        &self,
        codec: &C,
        raw: &[u8],
    ) -> std::result::Result<Invocation, ShapeMismatch> {
        self.method.prepare(codec, raw)
    }

    /// Whether two descriptors share the same registered handler
    pub fn same_handler(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.method, &other.method)
    }
}

/// A named table of methods
pub struct Protocol<C> {
    name: String,
    methods: HashMap<String, MethodDescriptor<C>>,
}

impl<C: Codec> Protocol<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a method that answers with a result
    ///
    /// Registering the same method name twice keeps the later handler.
    pub fn call<A, R, F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Context, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
    {
        self.insert(method.into(), MethodDescriptor::new(MethodKind::Call, handler));
        self
    }

    /// Add a fire-and-forget method
    pub fn notify<A, F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(Context, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
    {
        self.insert(method.into(), MethodDescriptor::new(MethodKind::Notify, handler));
        self
    }

    /// Add a handler for a typed [`Method`], using its kind
    pub fn handle<A, R, F, Fut>(mut self, method: &Method<A, R>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Context, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
    {
        if method.protocol() != self.name {
            warn!(
                protocol = %self.name,
                method = %method.qualified_name(),
                "Registering method declared for another protocol"
            );
        }
        self.insert(
            method.name().to_string(),
            MethodDescriptor::new(method.kind(), handler),
        );
        self
    }

    fn insert(&mut self, method: String, descriptor: MethodDescriptor<C>) {
        if self.methods.insert(method.clone(), descriptor).is_some() {
            warn!(protocol = %self.name, %method, "Replacing existing method handler");
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor<C>> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<C> fmt::Debug for Protocol<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// All protocols served on a connection
///
/// Mutated only through `&mut self`. Hand it to a
/// [`Dispatcher`](crate::Dispatcher), connection or server once every
/// protocol is registered; from then on it is shared read-only.
pub struct Registry<C> {
    protocols: HashMap<String, Protocol<C>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            protocols: HashMap::new(),
        }
    }
}

impl<C: Codec> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protocol, replacing any protocol registered under the same name
    pub fn register(&mut self, protocol: Protocol<C>) -> Option<Protocol<C>> {
        debug!(
            protocol = %protocol.name,
            methods = protocol.len(),
            "Registering protocol"
        );
        let replaced = self.protocols.insert(protocol.name.clone(), protocol);
        if let Some(old) = &replaced {
            warn!(protocol = %old.name, "Replaced previously registered protocol");
        }
        replaced
    }

    /// Look up a method by protocol and method name
    pub fn resolve(&self, protocol: &str, method: &str) -> Result<&MethodDescriptor<C>> {
        self.protocols
            .get(protocol)
            .and_then(|p| p.method(method))
            .ok_or_else(|| RpcError::UnknownMethod {
                protocol: protocol.to_string(),
                method: method.to_string(),
            })
    }

    /// Look up a method by its dotted `protocol.method` name
    pub fn resolve_qualified(&self, name: &str) -> Result<&MethodDescriptor<C>> {
        match split_qualified(name) {
            Some((protocol, method)) => self.resolve(protocol, method),
            None => Err(RpcError::UnknownMethod {
                protocol: String::new(),
                method: name.to_string(),
            }),
        }
    }

    pub fn protocol(&self, name: &str) -> Option<&Protocol<C>> {
        self.protocols.get(name)
    }

    pub fn protocol_names(&self) -> impl Iterator<Item = &str> {
        self.protocols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}
