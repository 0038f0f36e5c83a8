use std::sync::Arc;
use std::time::Duration;

use switchboard_core::Context;
use switchboard_fabric::transport::{Transport, TransportListener};
use switchboard_fabric::Codec;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::registry::Registry;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Serves one registry to every connection a listener accepts
pub struct Server<C> {
    registry: Arc<Registry<C>>,
    codec: C,
    config: ConnectionConfig,
}

impl<C: Codec> Server<C> {
    pub fn new(registry: impl Into<Arc<Registry<C>>>, codec: C) -> Self {
        Self {
            registry: registry.into(),
            codec,
            config: ConnectionConfig::default(),
        }
    }

    /// Settings applied to every accepted connection
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    /// Serve a single already-established transport
    ///
    /// The connection stays up only while the returned handle (or a clone) is alive.
    pub fn attach(&self, transport: impl Transport + 'static) -> Connection<C> {
        self.connection("attached".to_string(), transport)
    }

    /// Accept connections until `shutdown` is cancelled
    ///
    /// Every accepted connection is closed before this returns.
    pub async fn serve<L: TransportListener>(&self, mut listener: L, shutdown: Context) -> Result<()> {
        info!(protocols = self.registry.len(), codec = self.codec.name(), "Server started");

        let mut connections: Vec<Connection<C>> = Vec::new();
        let mut accepted: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.done() => break,
                next = listener.accept() => next,
            };

            match next {
                Ok(transport) => {
                    accepted += 1;
                    connections.retain(|conn| !conn.is_closed());
                    let conn = self.connection(format!("conn-{}", accepted), transport);
                    debug!(connection = %conn.name(), open = connections.len() + 1, "Accepted connection");
                    connections.push(conn);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!(open = connections.len(), "Server shutting down");
        for conn in &connections {
            conn.close();
        }
        listener.close().await?;
        Ok(())
    }

    fn connection(&self, name: String, transport: impl Transport + 'static) -> Connection<C> {
        Connection::builder(self.codec.clone())
            .name(name)
            .registry(Arc::clone(&self.registry))
            .config(self.config.clone())
            .spawn(transport)
    }
}
