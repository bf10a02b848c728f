//! Argument autocompletion: references and the completion/complete surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a completion request is completing against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Reference {
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },

    #[serde(rename = "ref/resource")]
    Resource { uri: String },
}

impl Reference {
    pub fn prompt(name: impl Into<String>) -> Self {
        Reference::Prompt { name: name.into() }
    }

    pub fn resource(uri: impl Into<String>) -> Self {
        Reference::Resource { uri: uri.into() }
    }
}

/// The argument being completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionArgument {
    pub name: String,
    pub value: String,
}

/// Previously resolved argument values, for context-aware completion.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CompletionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteRequest {
    #[serde(rename = "ref")]
    pub reference: Reference,

    pub argument: CompletionArgument,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<CompletionContext>,
}

impl CompleteRequest {
    pub fn new(reference: Reference, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            reference,
            argument: CompletionArgument {
                name: name.into(),
                value: value.into(),
            },
            context: None,
        }
    }
}

/// At most 100 candidate values per page.
pub const MAX_COMPLETION_VALUES: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub values: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

impl Completion {
    /// Build a completion, truncating to the wire limit and setting
    /// `total`/`hasMore` from the untruncated count.
    pub fn new(values: Vec<String>) -> Self {
        let total = values.len() as u64;
        let truncated = values.len() > MAX_COMPLETION_VALUES;
        let mut values = values;
        values.truncate(MAX_COMPLETION_VALUES);
        Self {
            values,
            total: Some(total),
            has_more: truncated.then_some(true),
        }
    }

    /// A completion with no extra pagination metadata.
    pub fn plain(values: Vec<String>) -> Self {
        let mut values = values;
        values.truncate(MAX_COMPLETION_VALUES);
        Self {
            values,
            total: None,
            has_more: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteResponse {
    pub completion: Completion,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_tags() {
        assert_eq!(
            serde_json::to_value(Reference::prompt("irrelevant")).unwrap(),
            json!({"type": "ref/prompt", "name": "irrelevant"})
        );
        assert_eq!(
            serde_json::to_value(Reference::resource("test://r")).unwrap(),
            json!({"type": "ref/resource", "uri": "test://r"})
        );
        assert!(serde_json::from_value::<Reference>(json!({"type": "ref/tool", "name": "x"}))
            .is_err());
    }

    #[test]
    fn values_are_capped_at_limit() {
        let many: Vec<String> = (0..250).map(|i| format!("v{i}")).collect();
        let completion = Completion::new(many);
        assert_eq!(completion.values.len(), MAX_COMPLETION_VALUES);
        assert_eq!(completion.total, Some(250));
        assert_eq!(completion.has_more, Some(true));
    }

    #[test]
    fn small_completion_has_no_more() {
        let completion = Completion::new(vec!["formal".to_string()]);
        assert_eq!(completion.values, vec!["formal"]);
        assert_eq!(completion.has_more, None);
    }

    #[test]
    fn request_uses_ref_key() {
        let request = CompleteRequest::new(Reference::prompt("p"), "style", "fo");
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["ref"]["type"], "ref/prompt");
        assert_eq!(encoded["argument"], json!({"name": "style", "value": "fo"}));
    }
}
