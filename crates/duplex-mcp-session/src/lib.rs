//! # Duplex MCP Session
//!
//! The bidirectional session engine: one instance per connection, on either
//! side of the wire. The engine owns request/response correlation,
//! cancellation, progress routing and the lifecycle state machine; the
//! server and client crates plug their method tables in through the
//! [`RequestDispatcher`] seam.

pub mod dispatcher;
pub mod engine;
pub mod progress;

pub use dispatcher::{RequestContext, RequestDispatcher};
pub use engine::{RequestOptions, Session, SessionConfig, SessionHandle};
pub use progress::{progress_channel, Progress, ProgressReceiver, ProgressReporter, ProgressSender};

pub use tokio_util::sync::CancellationToken;
