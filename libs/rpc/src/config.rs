use std::time::Duration;

const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1024;

/// Per-connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound for every outgoing call, on top of the caller's context
    pub call_timeout: Option<Duration>,
    /// Frames buffered for the writer before senders wait
    pub outbound_capacity: usize,
    /// Incoming requests allowed to run at once; `None` means unbounded
    pub max_concurrent_requests: Option<usize>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            call_timeout: None,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_concurrent_requests: Some(DEFAULT_MAX_CONCURRENT_REQUESTS),
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail outgoing calls that take longer than `timeout`
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Set the outbound frame queue depth
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Limit how many incoming requests run concurrently
    pub fn max_concurrent_requests(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_requests = limit.map(|n| n.max(1));
        self
    }
}
