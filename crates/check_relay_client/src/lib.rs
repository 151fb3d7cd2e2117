//! Subscriber side of the check status relay: a WebSocket client that
//! subscribes to one check, keeps the connection alive, and reconnects on a
//! bounded retry budget.

pub mod error;
pub mod watcher;

pub use error::ClientError;
pub use watcher::{watch, WatchConfig, DEFAULT_CONNECT_TIMEOUT};
