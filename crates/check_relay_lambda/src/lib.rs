//! AWS-oriented adapters and handlers for the check relay.
//!
//! This crate owns runtime integration details: the WebSocket gateway Lambda
//! handlers, the queue polling loop, the check worker pipeline, and the AWS
//! SDK adapters they run against. Message contracts and pure state live in
//! `check_relay_core`.

pub mod adapters;
pub mod check;
pub mod handlers;
pub mod poller;
