//! Frames exchanged by two connected peers
//!
//! Every frame is one [`Message`], encoded with the connection's codec.
//! Method arguments and results are encoded separately and carried as opaque
//! bytes, so the envelope never needs to know their types.

use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, RpcError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Request expecting a `Response` with the same `seqid`
    Call {
        seqid: u64,
        method: String,
        args: Vec<u8>,
    },
    Response {
        seqid: u64,
        result: Result<Vec<u8>, WireError>,
    },
    /// Request that is never answered
    Notify { method: String, args: Vec<u8> },
    /// The caller gave up on `seqid`
    Cancel { seqid: u64 },
}

/// Error carried in a `Response` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireError {
    UnknownMethod {
        protocol: String,
        method: String,
    },
    ArgumentType {
        method: String,
        expected: String,
        received: String,
    },
    Handler(HandlerError),
    Cancelled,
    DeadlineExceeded,
    Internal(String),
    Overloaded,
}

impl From<RpcError> for WireError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::UnknownMethod { protocol, method } => {
                WireError::UnknownMethod { protocol, method }
            }
            RpcError::ArgumentType {
                method,
                expected,
                received,
            } => WireError::ArgumentType {
                method,
                expected,
                received,
            },
            RpcError::Handler(e) => WireError::Handler(e),
            RpcError::Cancelled => WireError::Cancelled,
            RpcError::DeadlineExceeded => WireError::DeadlineExceeded,
            RpcError::Transport(e) => WireError::Internal(e.to_string()),
            RpcError::Internal(msg) => WireError::Internal(msg),
            RpcError::Overloaded => WireError::Overloaded,
        }
    }
}

impl From<WireError> for RpcError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::UnknownMethod { protocol, method } => {
                RpcError::UnknownMethod { protocol, method }
            }
            WireError::ArgumentType {
                method,
                expected,
                received,
            } => RpcError::ArgumentType {
                method,
                expected,
                received,
            },
            WireError::Handler(e) => RpcError::Handler(e),
            WireError::Cancelled => RpcError::Cancelled,
            WireError::DeadlineExceeded => RpcError::DeadlineExceeded,
            WireError::Internal(msg) => RpcError::Internal(msg),
            WireError::Overloaded => RpcError::Overloaded,
        }
    }
}
