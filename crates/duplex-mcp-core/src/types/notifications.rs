//! Notification payloads: cancellation, progress, logging and the
//! list-changed family.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::jsonrpc::{ProgressToken, RequestId};

/// Params of `notifications/cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelledNotification {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CancelledNotification {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Params of `notifications/progress`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressNotification {
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,

    pub progress: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// RFC 5424 severity levels, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// Params of `logging/setLevel`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetLevelRequest {
    pub level: LogLevel,
}

/// Params of `notifications/message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingMessageNotification {
    pub level: LogLevel,

    pub data: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
}

impl LoggingMessageNotification {
    pub fn new(level: LogLevel, data: Value) -> Self {
        Self {
            level,
            data,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }
}

/// Params of `ping`: an empty object, echoed back as an empty result.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PingRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EmptyResult {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cancelled_keeps_request_id_type() {
        let numeric = CancelledNotification::new(RequestId::number(7)).with_reason("user");
        assert_eq!(
            serde_json::to_value(&numeric).unwrap(),
            json!({"requestId": 7, "reason": "user"})
        );

        let string = CancelledNotification::new(RequestId::string("7"));
        assert_eq!(
            serde_json::to_value(&string).unwrap(),
            json!({"requestId": "7"})
        );
    }

    #[test]
    fn log_levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Emergency);
    }

    #[test]
    fn progress_notification_round_trips() {
        let notification = ProgressNotification {
            progress_token: ProgressToken::from(3),
            progress: 0.5,
            total: Some(1.0),
            message: Some("halfway".to_string()),
        };
        let encoded = serde_json::to_string(&notification).unwrap();
        let decoded: ProgressNotification = serde_json::from_str(&encoded).unwrap();
        assert_eq!(notification, decoded);
    }
}
