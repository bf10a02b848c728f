//! Roots: top-level URIs the client exposes for resource navigation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Root {
    /// Root URI, conventionally `file://...`.
    pub uri: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ListRootsRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRootsResponse {
    pub roots: Vec<Root>,
}
