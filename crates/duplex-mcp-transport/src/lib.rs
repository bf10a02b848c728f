//! # Duplex MCP Transport
//!
//! The transport port: the message-oriented duplex channel the session
//! engine speaks through. The engine never sees bytes; a concrete
//! transport (stdio pipes, HTTP streaming, an in-process channel) frames
//! complete JSON values into [`Message`]s and hands them over here.
//!
//! The contract is small:
//!
//! - [`Transport::send`] queues one outbound frame and fails with
//!   [`TransportError::NotConnected`] once the port is closed;
//! - [`Transport::messages`] yields the inbound frame stream exactly once:
//!   a single consumer, frames in order, each at most once, terminated when
//!   the remote closes (with a final error item when there is a cause);
//! - [`Transport::close`] is idempotent and terminates the stream.
//!
//! Reconnection is a concrete-transport concern; the engine gets a fresh
//! port per connection.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use duplex_mcp_core::Message;

pub mod duplex;

pub use duplex::{pair, DuplexTransport};

pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The port is closed; the frame was not sent.
    #[error("transport not connected")]
    NotConnected,

    /// The remote closed the connection.
    #[error("connection closed{}", .cause.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
    ConnectionClosed { cause: Option<String> },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("internal transport error: {message}")]
    InternalError { message: String },
}

/// The inbound frame stream of one port. Single consumer; the channel
/// closing means the remote disconnected.
pub type MessageStream = mpsc::UnboundedReceiver<TransportResult<Message>>;

/// A connected message-oriented duplex channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one frame for delivery to the peer.
    async fn send(&self, frame: Message) -> TransportResult<()>;

    /// Take the inbound frame stream.
    ///
    /// May be called once; later calls return a stream that is already
    /// terminated.
    fn messages(&mut self) -> MessageStream;

    /// Identifier of the underlying session, when the transport multiplexes
    /// sessions.
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Close the port. Idempotent; completes the message stream.
    async fn close(&self) -> TransportResult<()>;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&self, frame: Message) -> TransportResult<()> {
        (**self).send(frame).await
    }

    fn messages(&mut self) -> MessageStream {
        (**self).messages()
    }

    fn session_id(&self) -> Option<String> {
        (**self).session_id()
    }

    async fn close(&self) -> TransportResult<()> {
        (**self).close().await
    }
}
