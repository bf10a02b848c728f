//! JSON-RPC 2.0 envelope model.
//!
//! A frame is one of four shapes: request (`id` + `method`), notification
//! (`method`, no `id`), response (`id` + `result`) or error (`id` + `error`).
//! Decoding buffers the whole object first and classifies by which fields are
//! present, so property order on the wire never matters.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    /// Invalid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// Valid JSON, malformed envelope.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method or capability not advertised.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Missing or malformed parameters, unknown name/uri, bad cursor.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Handler failed unexpectedly.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Implementation-defined server error range.
    pub const SERVER_ERROR_START: i32 = -32000;
    pub const SERVER_ERROR_END: i32 = -32099;
}

/// Request identifier: a string or a signed 64-bit integer.
///
/// The JSON type is part of the identity: `42` and `"42"` are distinct ids
/// and each round-trips as its original type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn number(n: i64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Progress token carried in a request's `_meta.progressToken`.
///
/// Opaque to the engine; only used to route `notifications/progress` frames
/// back to the originator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    String(String),
    Number(i64),
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::String(s) => write!(f, "{s}"),
            ProgressToken::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for ProgressToken {
    fn from(n: i64) -> Self {
        ProgressToken::Number(n)
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        ProgressToken::String(s.to_string())
    }
}

/// A request frame: carries an id and expects exactly one response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub id: RequestId,
    pub method: String,
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Progress token injected into (or supplied with) this request's params.
    pub fn progress_token(&self) -> Option<ProgressToken> {
        self.params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|m| m.get("progressToken"))
            .and_then(|t| serde_json::from_value(t.clone()).ok())
    }
}

/// A notification frame: fire-and-forget, never answered.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcNotification {
    pub method: String,
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A successful response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self { id, result }
    }
}

/// The `error` member of an error frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// An error response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcErrorResponse {
    pub id: RequestId,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: RequestId, error: JsonRpcError) -> Self {
        Self { id, error }
    }
}

/// One complete JSON-RPC frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
}

impl Message {
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Request(JsonRpcRequest::new(id, method, params))
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Notification(JsonRpcNotification::new(method, params))
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        Message::Response(JsonRpcResponse::new(id, result))
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Message::Error(JsonRpcErrorResponse::new(id, error))
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Notification(_) => None,
            Message::Response(r) => Some(&r.id),
            Message::Error(e) => Some(&e.id),
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(r) => Some(&r.method),
            Message::Notification(n) => Some(&n.method),
            _ => None,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = Map::new();
        map.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.into()));
        match self {
            Message::Request(r) => {
                map.insert("id".to_string(), id_to_value(&r.id));
                map.insert("method".to_string(), Value::String(r.method.clone()));
                if let Some(params) = &r.params {
                    map.insert("params".to_string(), params.clone());
                }
            }
            Message::Notification(n) => {
                map.insert("method".to_string(), Value::String(n.method.clone()));
                if let Some(params) = &n.params {
                    map.insert("params".to_string(), params.clone());
                }
            }
            Message::Response(r) => {
                map.insert("id".to_string(), id_to_value(&r.id));
                map.insert("result".to_string(), r.result.clone());
            }
            Message::Error(e) => {
                map.insert("id".to_string(), id_to_value(&e.id));
                let error = serde_json::to_value(&e.error).map_err(serde::ser::Error::custom)?;
                map.insert("error".to_string(), error);
            }
        }
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Message::classify(value).map_err(D::Error::custom)
    }
}

fn id_to_value(id: &RequestId) -> Value {
    match id {
        RequestId::String(s) => Value::String(s.clone()),
        RequestId::Number(n) => Value::Number((*n).into()),
    }
}

fn id_from_value(value: &Value) -> Result<RequestId, String> {
    match value {
        Value::String(s) => Ok(RequestId::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(RequestId::Number)
            .ok_or_else(|| format!("request id must be a 64-bit integer, got {n}")),
        other => Err(format!("request id must be a string or integer, got {other}")),
    }
}

impl Message {
    /// Classify an already-parsed JSON value into one of the four frame
    /// shapes. Any other shape is an error.
    pub fn classify(value: Value) -> Result<Self, String> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => return Err(format!("frame must be a JSON object, got {other}")),
        };

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(other) => return Err(format!("unsupported jsonrpc version: {other}")),
            None => return Err("missing jsonrpc version".to_string()),
        }

        let id = obj.get("id").map(id_from_value).transpose()?;
        let method = match obj.get("method") {
            Some(Value::String(m)) => Some(m.clone()),
            Some(other) => return Err(format!("method must be a string, got {other}")),
            None => None,
        };
        let params = obj.get("params").cloned();

        match (id, method) {
            (Some(id), Some(method)) => Ok(Message::Request(JsonRpcRequest { id, method, params })),
            (None, Some(method)) => Ok(Message::Notification(JsonRpcNotification { method, params })),
            (Some(id), None) => {
                if let Some(error) = obj.get("error") {
                    let error: JsonRpcError =
                        serde_json::from_value(error.clone()).map_err(|e| e.to_string())?;
                    Ok(Message::Error(JsonRpcErrorResponse { id, error }))
                } else if let Some(result) = obj.get("result") {
                    Ok(Message::Response(JsonRpcResponse {
                        id,
                        result: result.clone(),
                    }))
                } else {
                    Err("response frame carries neither result nor error".to_string())
                }
            }
            (None, None) => Err("frame has neither id nor method".to_string()),
        }
    }

    /// Parse one frame from its wire bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        Message::classify(value)
    }
}
