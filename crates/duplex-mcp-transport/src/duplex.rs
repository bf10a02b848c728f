//! In-memory transport pair.
//!
//! Two connected ports over unbounded channels: what one side sends, the
//! other receives, in order and at most once. This is the loopback used by
//! the test suites and by hosts that run client and server in one process.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use duplex_mcp_core::Message;

use crate::{MessageStream, Transport, TransportError, TransportResult};

/// One end of an in-memory connection.
pub struct DuplexTransport {
    label: &'static str,
    outgoing: Mutex<Option<mpsc::UnboundedSender<TransportResult<Message>>>>,
    incoming: Mutex<Option<MessageStream>>,
}

/// Build a connected pair. By convention the first end goes to the client,
/// the second to the server; the ports themselves are symmetric.
pub fn pair() -> (DuplexTransport, DuplexTransport) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let a = DuplexTransport {
        label: "duplex-a",
        outgoing: Mutex::new(Some(b_tx)),
        incoming: Mutex::new(Some(a_rx)),
    };
    let b = DuplexTransport {
        label: "duplex-b",
        outgoing: Mutex::new(Some(a_tx)),
        incoming: Mutex::new(Some(b_rx)),
    };
    (a, b)
}

impl DuplexTransport {
    fn sender(&self) -> Option<mpsc::UnboundedSender<TransportResult<Message>>> {
        self.outgoing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, frame: Message) -> TransportResult<()> {
        let sender = self.sender().ok_or(TransportError::NotConnected)?;
        trace!(label = self.label, "sending frame");
        sender
            .send(Ok(frame))
            .map_err(|_| TransportError::NotConnected)
    }

    fn messages(&mut self) -> MessageStream {
        let mut guard = self
            .incoming
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take().unwrap_or_else(|| {
            // already taken: hand back a stream that is born closed
            let (_, rx) = mpsc::unbounded_channel();
            rx
        })
    }

    async fn close(&self) -> TransportResult<()> {
        // dropping our sender completes the peer's stream; taking it makes
        // close idempotent and later sends fail NotConnected
        self.outgoing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        Ok(())
    }
}
