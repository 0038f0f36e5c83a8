use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a method handler
///
/// Opaque to the RPC layer: it is carried to the caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct HandlerError {
    code: Option<i32>,
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Attach an application-defined status code
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<switchboard_core::Error> for HandlerError {
    fn from(err: switchboard_core::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("unknown method: {protocol}.{method}")]
    UnknownMethod { protocol: String, method: String },

    #[error("argument type mismatch for {method}: expected {expected}, received {received}")]
    ArgumentType {
        method: String,
        expected: String,
        received: String,
    },

    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("transport error: {0}")]
    Transport(#[from] switchboard_fabric::Error),

    #[error("call cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),

    /// The serving side refused the request because its concurrency limit was reached
    #[error("peer is at its concurrent request limit")]
    Overloaded,
}

impl RpcError {
    pub(crate) fn closed() -> Self {
        RpcError::Transport(switchboard_fabric::Error::ConnectionClosed)
    }

    /// Whether the failure came from the caller's context rather than the remote side
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RpcError::Cancelled | RpcError::DeadlineExceeded)
    }
}

impl From<switchboard_core::Error> for RpcError {
    fn from(err: switchboard_core::Error) -> Self {
        match err {
            switchboard_core::Error::Cancelled => RpcError::Cancelled,
            switchboard_core::Error::DeadlineExceeded => RpcError::DeadlineExceeded,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
