//! Real-time route relay
//!
//! Peers publish travel routes over a WebSocket event channel; the relay
//! validates them, keeps the latest route per connection in memory and in a
//! durable SQLite store, fans updates out to every other peer and answers
//! route-matching queries over HTTP.

pub mod api;
pub mod config;
pub mod metrics;
pub mod relay;
pub mod route;
pub mod service;
pub mod store;
