//! Progress plumbing.
//!
//! The originator of a request supplies a [`ProgressSender`]; the engine
//! mints a progress token, rides it in the request's `_meta`, and forwards
//! matching `notifications/progress` frames into the sink. On the receiving
//! side, a handler whose inbound request carried a token gets a
//! [`ProgressReporter`] to emit updates through.

use serde_json::json;
use tokio::sync::mpsc;

use duplex_mcp_core::protocol::methods;
use duplex_mcp_core::types::ProgressNotification;
use duplex_mcp_core::{Message, ProgressToken};

/// One progress update routed back to a request's originator.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

pub type ProgressSender = mpsc::UnboundedSender<Progress>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<Progress>;

/// Channel pair for receiving progress updates of one outbound request.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Emits `notifications/progress` frames for one inbound request.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    token: ProgressToken,
    outbound: mpsc::UnboundedSender<Message>,
}

impl ProgressReporter {
    pub(crate) fn new(token: ProgressToken, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self { token, outbound }
    }

    pub fn token(&self) -> &ProgressToken {
        &self.token
    }

    /// Report progress. Errors are swallowed: a progress update racing the
    /// session teardown has nowhere to go.
    pub fn report(&self, progress: f64, total: Option<f64>, message: Option<&str>) {
        let notification = ProgressNotification {
            progress_token: self.token.clone(),
            progress,
            total,
            message: message.map(str::to_string),
        };
        let frame = Message::notification(
            methods::NOTIFICATION_PROGRESS,
            Some(json!(notification)),
        );
        let _ = self.outbound.send(frame);
    }
}
