//! Switchboard Core - request-scoped state shared by every layer
//!
//! The [`Context`] travels with each call and each dispatched request. It is
//! the only way work gets cancelled: handlers and callers observe it
//! cooperatively, nothing is aborted from the outside.

pub mod context;
pub mod error;

pub use context::Context;
pub use error::{Error, Result};
