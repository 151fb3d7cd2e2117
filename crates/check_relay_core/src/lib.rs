//! Shared check relay domain primitives.
//!
//! This crate owns the message contracts exchanged between the check worker,
//! the status topic, the WebSocket gateway handlers, and watching clients,
//! plus the pure state machines behind queue polling and bounded-retry
//! reconnects. It intentionally excludes AWS SDK and Lambda runtime concerns.

pub mod contract;
pub mod envelope;
pub mod polling;
pub mod reconnect;
pub mod storage_keys;
pub mod telemetry;
