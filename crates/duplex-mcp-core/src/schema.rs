//! JSON Schema helpers for tool input/output schemas.

use schemars::JsonSchema;
use serde_json::{json, Map, Value};

use crate::error::{McpError, McpResult};

/// Generate the JSON Schema for a typed tool argument struct.
pub fn schema_for<T: JsonSchema>() -> McpResult<Value> {
    let schema = schemars::schema_for!(T);
    Ok(serde_json::to_value(schema)?)
}

/// Build an object schema from a property map and required names.
pub fn object_schema(properties: Map<String, Value>, required: &[&str]) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Enforce that a schema is an object at the top level.
pub fn validate_object_schema(schema: &Value, field: &str) -> McpResult<()> {
    let is_object = schema
        .as_object()
        .and_then(|o| o.get("type"))
        .and_then(Value::as_str)
        == Some("object");
    if !is_object {
        return Err(McpError::invalid_params(format!(
            "{field} must be a JSON Schema with top-level type \"object\""
        )));
    }
    Ok(())
}
