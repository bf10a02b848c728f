//! # Duplex MCP Client
//!
//! The client endpoint: connects over any transport, drives the initialize
//! handshake, exposes a typed wrapper for every server-callable method, and
//! answers server-initiated sampling, elicitation and roots requests
//! through the shared session engine.

pub mod client;
pub mod handlers;

pub use client::{Client, ClientBuilder, NotificationFn};
pub use handlers::{ElicitationHandler, SamplingHandler};
