use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use switchboard_core::Context;
use switchboard_fabric::transport::Transport;
use switchboard_fabric::{Channel, ChannelReceiver, ChannelSender, Codec};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, warn};

use crate::client::{Client, GenericClient};
use crate::config::ConnectionConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, RpcError};
use crate::message::{Message, WireError};
use crate::method::split_qualified;
use crate::registry::Registry;

/// How long a closing writer keeps flushing frames that were already queued
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type PendingCall = oneshot::Sender<Result<Vec<u8>>>;

/// Counters for one connection
#[derive(Debug, Default)]
pub struct ConnectionStats {
    calls_sent: AtomicU64,
    notifies_sent: AtomicU64,
    calls_served: AtomicU64,
    notifies_served: AtomicU64,
    notify_failures: AtomicU64,
    requests_refused: AtomicU64,
}

impl ConnectionStats {
    pub fn calls_sent(&self) -> u64 {
        self.calls_sent.load(Ordering::Relaxed)
    }

    pub fn notifies_sent(&self) -> u64 {
        self.notifies_sent.load(Ordering::Relaxed)
    }

    pub fn calls_served(&self) -> u64 {
        self.calls_served.load(Ordering::Relaxed)
    }

    pub fn notifies_served(&self) -> u64 {
        self.notifies_served.load(Ordering::Relaxed)
    }

    /// Incoming notifications whose handler or decode failed
    ///
    /// Nobody is waiting on a notification, so this counter and the log are
    /// the only place those failures show up.
    pub fn notify_failures(&self) -> u64 {
        self.notify_failures.load(Ordering::Relaxed)
    }

    /// Incoming requests turned away at the concurrency limit
    pub fn requests_refused(&self) -> u64 {
        self.requests_refused.load(Ordering::Relaxed)
    }
}

/// A multiplexed, bidirectional RPC session over one transport
///
/// Either side may call the other. Outgoing calls are correlated by sequence
/// id, so any number can be in flight at once. When built with a registry the
/// connection also serves incoming requests, each in its own task.
///
/// The connection closes when the last handle (including any [`Client`]
/// built from it) is dropped.
pub struct Connection<C> {
    inner: Arc<Inner<C>>,
    handle: Arc<Handle>,
}

impl<C> Clone for Connection<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handle: Arc::clone(&self.handle),
        }
    }
}

/// Shared by user-facing handles only; the reader and writer tasks never hold it
struct Handle {
    lifetime: Context,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

struct Inner<C> {
    name: String,
    codec: C,
    config: ConnectionConfig,
    outbound: mpsc::Sender<Message>,
    pending: DashMap<u64, PendingCall>,
    in_flight: DashMap<u64, Context>,
    next_seqid: AtomicU64,
    lifetime: Context,
    stats: ConnectionStats,
    dispatcher: Option<Dispatcher<C>>,
    limiter: Option<Arc<Semaphore>>,
}

pub struct ConnectionBuilder<C> {
    codec: C,
    name: String,
    registry: Option<Arc<Registry<C>>>,
    config: ConnectionConfig,
}

impl<C: Codec> ConnectionBuilder<C> {
    /// Label used in log lines for this connection
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Serve incoming requests from `registry`
    pub fn registry(mut self, registry: impl Into<Arc<Registry<C>>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the connection's reader and writer tasks
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self, transport: impl Transport + 'static) -> Connection<C> {
        self.spawn_boxed(Box::new(transport))
    }

    pub fn spawn_boxed(self, transport: Box<dyn Transport>) -> Connection<C> {
        let (sender, receiver) = Channel::from_boxed(transport, self.codec.clone()).split();
        let (outbound, outbound_rx) = mpsc::channel(self.config.outbound_capacity.max(1));

        let limiter = self
            .config
            .max_concurrent_requests
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let dispatcher = self
            .registry
            .map(|registry| Dispatcher::new(registry, self.codec.clone()));

        let inner = Arc::new(Inner {
            name: self.name,
            codec: self.codec,
            config: self.config,
            outbound,
            pending: DashMap::new(),
            in_flight: DashMap::new(),
            next_seqid: AtomicU64::new(1),
            lifetime: Context::background(),
            stats: ConnectionStats::default(),
            dispatcher,
            limiter,
        });

        debug!(connection = %inner.name, serving = inner.dispatcher.is_some(), "Connection started");

        tokio::spawn(write_loop(
            inner.name.clone(),
            inner.lifetime.clone(),
            sender,
            outbound_rx,
        ));
        tokio::spawn(read_loop(Arc::clone(&inner), receiver));

        let handle = Arc::new(Handle {
            lifetime: inner.lifetime.clone(),
        });
        Connection { inner, handle }
    }
}

impl<C: Codec> Connection<C> {
    pub fn builder(codec: C) -> ConnectionBuilder<C> {
        ConnectionBuilder {
            codec,
            name: "connection".to_string(),
            registry: None,
            config: ConnectionConfig::default(),
        }
    }

    /// Calling-only connection with default settings
    pub fn new(transport: impl Transport + 'static, codec: C) -> Self {
        Self::builder(codec).spawn(transport)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.inner.stats
    }

    /// Outgoing calls still waiting for a response
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Incoming calls whose handler is still running
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Typed stub over this connection
    pub fn client(&self) -> Client<Self, C> {
        Client::new(self.clone(), self.inner.codec.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lifetime.is_cancelled()
    }

    /// Shut the connection down
    ///
    /// Pending calls fail with a closed-connection error and running handlers
    /// see their context cancelled.
    pub fn close(&self) {
        self.inner.lifetime.cancel();
    }

    /// Wait until the connection is closed by either side
    pub async fn closed(&self) {
        self.inner.lifetime.done().await;
    }

    /// Send an encoded request and wait for the encoded result
    pub async fn call_raw(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<Vec<u8>> {
        ctx.check()?;
        let inner = &self.inner;
        let ctx = match inner.config.call_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let seqid = inner.next_seqid.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(seqid, tx);
        let _guard = PendingGuard {
            pending: &inner.pending,
            seqid,
        };

        // The reader drains `pending` on shutdown; an entry added after that is never answered
        if inner.lifetime.is_cancelled() {
            return Err(RpcError::closed());
        }

        let frame = Message::Call {
            seqid,
            method: method.to_string(),
            args,
        };
        ctx.run(inner.outbound.send(frame))
            .await?
            .map_err(|_| RpcError::closed())?;
        inner.stats.calls_sent.fetch_add(1, Ordering::Relaxed);

        match ctx.run(rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::closed()),
            Err(reason) => {
                debug!(connection = %inner.name, %method, seqid, %reason, "Abandoning call");
                if inner.outbound.try_send(Message::Cancel { seqid }).is_err() {
                    debug!(connection = %inner.name, seqid, "Could not queue cancel frame");
                }
                Err(reason.into())
            }
        }
    }

    /// Send an encoded request that is never answered
    ///
    /// Returns once the frame is queued for the transport.
    pub async fn notify_raw(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<()> {
        ctx.check()?;
        let inner = &self.inner;
        if inner.lifetime.is_cancelled() {
            return Err(RpcError::closed());
        }

        let frame = Message::Notify {
            method: method.to_string(),
            args,
        };
        ctx.run(inner.outbound.send(frame))
            .await?
            .map_err(|_| RpcError::closed())?;
        inner.stats.notifies_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: Codec> GenericClient for Connection<C> {
    async fn call(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<Vec<u8>> {
        self.call_raw(ctx, method, args).await
    }

    async fn notify(&self, ctx: &Context, method: &str, args: Vec<u8>) -> Result<()> {
        self.notify_raw(ctx, method, args).await
    }
}

impl<C> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.inner.name)
            .field("closed", &self.inner.lifetime.is_cancelled())
            .field("pending", &self.inner.pending.len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

/// Drops the pending entry for a call that returns early or is abandoned
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, PendingCall>,
    seqid: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.seqid);
    }
}

impl<C: Codec> Inner<C> {
    /// Route one incoming frame; returns a reply the reader must queue itself
    fn handle(self: &Arc<Self>, message: Message) -> Option<Message> {
        match message {
            Message::Call {
                seqid,
                method,
                args,
            } => return self.serve_call(seqid, method, args),
            Message::Notify { method, args } => self.serve_notify(method, args),
            Message::Response { seqid, result } => match self.pending.remove(&seqid) {
                Some((_, waiter)) => {
                    let _ = waiter.send(result.map_err(RpcError::from));
                }
                None => {
                    debug!(connection = %self.name, seqid, "Response for unknown or abandoned call")
                }
            },
            Message::Cancel { seqid } => {
                if let Some(ctx) = self.in_flight.get(&seqid) {
                    debug!(connection = %self.name, seqid, "Peer cancelled call");
                    ctx.cancel();
                }
            }
        }
        None
    }

    /// Take a concurrency slot for one incoming request
    fn admit(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, TryAcquireError> {
        match &self.limiter {
            Some(limiter) => Arc::clone(limiter).try_acquire_owned().map(Some),
            None => Ok(None),
        }
    }

    fn serve_call(self: &Arc<Self>, seqid: u64, method: String, args: Vec<u8>) -> Option<Message> {
        let permit = match self.admit() {
            Ok(permit) => permit,
            Err(_) => {
                self.stats.requests_refused.fetch_add(1, Ordering::Relaxed);
                debug!(connection = %self.name, %method, seqid, "Refusing call over the concurrency limit");
                return Some(Message::Response {
                    seqid,
                    result: Err(WireError::Overloaded),
                });
            }
        };

        let ctx = self.lifetime.child();
        self.in_flight.insert(seqid, ctx.clone());

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = inner.run_request(ctx, &method, &args).await;
            inner.in_flight.remove(&seqid);
            drop(permit);
            inner.stats.calls_served.fetch_add(1, Ordering::Relaxed);

            if inner.lifetime.is_cancelled() {
                debug!(connection = %inner.name, seqid, "Connection closed before response was sent");
                return;
            }

            let result = match outcome {
                Ok(Some(bytes)) => Ok(bytes),
                // Notify-kind method reached through a call frame: answer with an empty result
                Ok(None) => inner
                    .codec
                    .encode(&())
                    .map_err(|e| WireError::Internal(e.to_string())),
                Err(err) => {
                    debug!(connection = %inner.name, %method, seqid, error = %err, "Call failed");
                    Err(WireError::from(err))
                }
            };

            if inner
                .outbound
                .send(Message::Response { seqid, result })
                .await
                .is_err()
            {
                debug!(connection = %inner.name, seqid, "Connection closed before response was sent");
            }
        });
        None
    }

    fn serve_notify(self: &Arc<Self>, method: String, args: Vec<u8>) {
        let Ok(permit) = self.admit() else {
            self.stats.requests_refused.fetch_add(1, Ordering::Relaxed);
            self.stats.notify_failures.fetch_add(1, Ordering::Relaxed);
            warn!(connection = %self.name, %method, "Dropping notification over the concurrency limit");
            return;
        };

        let ctx = self.lifetime.child();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = inner.run_request(ctx, &method, &args).await;
            drop(permit);
            inner.stats.notifies_served.fetch_add(1, Ordering::Relaxed);
            if let Err(err) = outcome {
                inner.stats.notify_failures.fetch_add(1, Ordering::Relaxed);
                warn!(connection = %inner.name, %method, error = %err, "Notification failed");
            }
        });
    }

    async fn run_request(
        &self,
        ctx: Context,
        method: &str,
        args: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let Some(dispatcher) = &self.dispatcher else {
            let (protocol, name) = split_qualified(method).unwrap_or(("", method));
            return Err(RpcError::UnknownMethod {
                protocol: protocol.to_string(),
                method: name.to_string(),
            });
        };

        dispatcher.dispatch_qualified(ctx, method, args).await
    }

    /// Fail everything still waiting on this connection
    fn shutdown(&self) {
        self.lifetime.cancel();

        let seqids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let failed = seqids.len();
        for seqid in seqids {
            if let Some((_, waiter)) = self.pending.remove(&seqid) {
                let _ = waiter.send(Err(RpcError::closed()));
            }
        }

        debug!(connection = %self.name, failed, "Connection closed");
    }
}

async fn write_loop<C: Codec>(
    name: String,
    lifetime: Context,
    mut sender: ChannelSender<C>,
    mut outbound: mpsc::Receiver<Message>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = lifetime.done() => {
                drain(&name, &mut sender, &mut outbound).await;
                break;
            }
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if let Err(e) = sender.send(&message).await {
            if e.is_closed() {
                debug!(connection = %name, "Peer closed while writing");
            } else {
                warn!(connection = %name, error = %e, "Failed to write frame");
            }
            break;
        }
    }

    lifetime.cancel();
    if let Err(e) = sender.close().await {
        debug!(connection = %name, error = %e, "Error closing transport");
    }
}

async fn drain<C: Codec>(
    name: &str,
    sender: &mut ChannelSender<C>,
    outbound: &mut mpsc::Receiver<Message>,
) {
    let flush = async {
        while let Ok(message) = outbound.try_recv() {
            if sender.send(&message).await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, flush).await.is_err() {
        debug!(connection = %name, "Gave up flushing queued frames");
    }
}

async fn read_loop<C: Codec>(inner: Arc<Inner<C>>, mut receiver: ChannelReceiver<C>) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = inner.lifetime.done() => break,
            frame = receiver.receive::<Message>() => frame,
        };

        match frame {
            Ok(message) => {
                if let Some(reply) = inner.handle(message) {
                    if inner.outbound.send(reply).await.is_err() {
                        debug!(connection = %inner.name, "Writer gone, dropping reply");
                    }
                }
            }
            Err(switchboard_fabric::Error::Codec(e)) => {
                warn!(connection = %inner.name, error = %e, "Dropping undecodable frame");
            }
            Err(e) if e.is_closed() => {
                debug!(connection = %inner.name, "Peer closed connection");
                break;
            }
            Err(e) => {
                warn!(connection = %inner.name, error = %e, "Failed to read frame");
                break;
            }
        }
    }

    inner.shutdown();
}
