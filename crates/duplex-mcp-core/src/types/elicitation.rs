//! Elicitation: the server asks the client to collect structured user input
//! described by a flat primitive-schema form.

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// String formats a primitive string field may demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFormat {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "date-time")]
    DateTime,
}

/// One field of an elicitation form.
///
/// Discriminated by `type`, with the enum subtype inferred from the presence
/// of an `enum` field on `"type": "string"`. Encoding emits the discriminator
/// first and only the fields valid for the subtype.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveSchema {
    String {
        title: Option<String>,
        description: Option<String>,
        min_length: Option<u64>,
        max_length: Option<u64>,
        format: Option<StringFormat>,
    },
    Enum {
        title: Option<String>,
        description: Option<String>,
        values: Vec<String>,
        value_names: Option<Vec<String>>,
    },
    Number {
        /// False for `"type": "number"`, true for `"type": "integer"`.
        integer: bool,
        title: Option<String>,
        description: Option<String>,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean {
        title: Option<String>,
        description: Option<String>,
        default: Option<bool>,
    },
}

impl PrimitiveSchema {
    pub fn string() -> Self {
        PrimitiveSchema::String {
            title: None,
            description: None,
            min_length: None,
            max_length: None,
            format: None,
        }
    }

    pub fn enumeration(values: Vec<String>) -> Self {
        PrimitiveSchema::Enum {
            title: None,
            description: None,
            values,
            value_names: None,
        }
    }

    pub fn integer() -> Self {
        PrimitiveSchema::Number {
            integer: true,
            title: None,
            description: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn number() -> Self {
        PrimitiveSchema::Number {
            integer: false,
            title: None,
            description: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn boolean() -> Self {
        PrimitiveSchema::Boolean {
            title: None,
            description: None,
            default: None,
        }
    }
}

impl Serialize for PrimitiveSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            PrimitiveSchema::String {
                title,
                description,
                min_length,
                max_length,
                format,
            } => {
                map.serialize_entry("type", "string")?;
                if let Some(title) = title {
                    map.serialize_entry("title", title)?;
                }
                if let Some(description) = description {
                    map.serialize_entry("description", description)?;
                }
                if let Some(min) = min_length {
                    map.serialize_entry("minLength", min)?;
                }
                if let Some(max) = max_length {
                    map.serialize_entry("maxLength", max)?;
                }
                if let Some(format) = format {
                    map.serialize_entry("format", format)?;
                }
            }
            PrimitiveSchema::Enum {
                title,
                description,
                values,
                value_names,
            } => {
                map.serialize_entry("type", "string")?;
                if let Some(title) = title {
                    map.serialize_entry("title", title)?;
                }
                if let Some(description) = description {
                    map.serialize_entry("description", description)?;
                }
                map.serialize_entry("enum", values)?;
                if let Some(names) = value_names {
                    map.serialize_entry("enumNames", names)?;
                }
            }
            PrimitiveSchema::Number {
                integer,
                title,
                description,
                minimum,
                maximum,
            } => {
                map.serialize_entry("type", if *integer { "integer" } else { "number" })?;
                if let Some(title) = title {
                    map.serialize_entry("title", title)?;
                }
                if let Some(description) = description {
                    map.serialize_entry("description", description)?;
                }
                if let Some(min) = minimum {
                    map.serialize_entry("minimum", min)?;
                }
                if let Some(max) = maximum {
                    map.serialize_entry("maximum", max)?;
                }
            }
            PrimitiveSchema::Boolean {
                title,
                description,
                default,
            } => {
                map.serialize_entry("type", "boolean")?;
                if let Some(title) = title {
                    map.serialize_entry("title", title)?;
                }
                if let Some(description) = description {
                    map.serialize_entry("description", description)?;
                }
                if let Some(default) = default {
                    map.serialize_entry("default", default)?;
                }
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PrimitiveSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| D::Error::custom("primitive schema must be an object"))?;

        let title = get_string(obj, "title");
        let description = get_string(obj, "description");

        match obj.get("type").and_then(Value::as_str) {
            Some("string") => {
                if let Some(values) = obj.get("enum") {
                    let values: Vec<String> =
                        serde_json::from_value(values.clone()).map_err(D::Error::custom)?;
                    let value_names = obj
                        .get("enumNames")
                        .map(|v| serde_json::from_value(v.clone()))
                        .transpose()
                        .map_err(D::Error::custom)?;
                    Ok(PrimitiveSchema::Enum {
                        title,
                        description,
                        values,
                        value_names,
                    })
                } else {
                    let format = obj
                        .get("format")
                        .map(|v| serde_json::from_value(v.clone()))
                        .transpose()
                        .map_err(D::Error::custom)?;
                    Ok(PrimitiveSchema::String {
                        title,
                        description,
                        min_length: obj.get("minLength").and_then(Value::as_u64),
                        max_length: obj.get("maxLength").and_then(Value::as_u64),
                        format,
                    })
                }
            }
            Some(kind @ ("number" | "integer")) => Ok(PrimitiveSchema::Number {
                integer: kind == "integer",
                title,
                description,
                minimum: obj.get("minimum").and_then(Value::as_f64),
                maximum: obj.get("maximum").and_then(Value::as_f64),
            }),
            Some("boolean") => Ok(PrimitiveSchema::Boolean {
                title,
                description,
                default: obj.get("default").and_then(Value::as_bool),
            }),
            Some(other) => Err(D::Error::custom(format!(
                "unknown primitive schema type: {other:?}"
            ))),
            None => Err(D::Error::custom("primitive schema missing type")),
        }
    }
}

fn get_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// The flat object schema describing an elicitation form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitationSchema {
    #[serde(rename = "type")]
    pub schema_type: ObjectType,

    pub properties: HashMap<String, PrimitiveSchema>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ElicitationSchema {
    pub fn new() -> Self {
        Self {
            schema_type: ObjectType::Object,
            properties: HashMap::new(),
            required: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: PrimitiveSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, names: Vec<String>) -> Self {
        self.required = Some(names);
        self
    }
}

impl Default for ElicitationSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// The literal `"object"` marker on an elicitation schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "object")]
    Object,
}

/// Params of `elicitation/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitRequest {
    pub message: String,

    #[serde(rename = "requestedSchema")]
    pub requested_schema: ElicitationSchema,
}

/// How the user answered an elicitation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// Result of `elicitation/create`. `content` is present only on accept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitResponse {
    pub action: ElicitAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, Value>>,
}

impl ElicitResponse {
    pub fn accept(content: HashMap<String, Value>) -> Self {
        Self {
            action: ElicitAction::Accept,
            content: Some(content),
        }
    }

    pub fn decline() -> Self {
        Self {
            action: ElicitAction::Decline,
            content: None,
        }
    }

    pub fn cancel() -> Self {
        Self {
            action: ElicitAction::Cancel,
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_subtype_is_inferred_from_enum_field() {
        let schema: PrimitiveSchema = serde_json::from_value(json!({
            "type": "string",
            "enum": ["red", "green"],
            "enumNames": ["Red", "Green"]
        }))
        .unwrap();
        match schema {
            PrimitiveSchema::Enum { values, value_names, .. } => {
                assert_eq!(values, vec!["red", "green"]);
                assert_eq!(value_names.unwrap(), vec!["Red", "Green"]);
            }
            other => panic!("expected enum schema, got {other:?}"),
        }
    }

    #[test]
    fn string_schema_round_trips_with_format() {
        let schema: PrimitiveSchema = serde_json::from_value(json!({
            "type": "string",
            "minLength": 1,
            "maxLength": 64,
            "format": "email"
        }))
        .unwrap();
        let encoded = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "string", "minLength": 1, "maxLength": 64, "format": "email"})
        );
    }

    #[test]
    fn integer_and_number_are_distinct() {
        let int: PrimitiveSchema =
            serde_json::from_value(json!({"type": "integer", "minimum": 0})).unwrap();
        let num: PrimitiveSchema =
            serde_json::from_value(json!({"type": "number", "minimum": 0})).unwrap();
        assert_ne!(int, num);
        assert_eq!(serde_json::to_value(&int).unwrap()["type"], "integer");
        assert_eq!(serde_json::to_value(&num).unwrap()["type"], "number");
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_value::<PrimitiveSchema>(json!({"type": "array"})).is_err());
        assert!(serde_json::from_value::<PrimitiveSchema>(json!({"minimum": 3})).is_err());
    }

    #[test]
    fn boolean_default_survives() {
        let schema: PrimitiveSchema =
            serde_json::from_value(json!({"type": "boolean", "default": true})).unwrap();
        assert_eq!(
            schema,
            PrimitiveSchema::Boolean {
                title: None,
                description: None,
                default: Some(true)
            }
        );
    }

    #[test]
    fn elicit_response_content_only_on_accept() {
        let decline = ElicitResponse::decline();
        let encoded = serde_json::to_value(&decline).unwrap();
        assert_eq!(encoded, json!({"action": "decline"}));

        let mut answers = HashMap::new();
        answers.insert("name".to_string(), json!("Ada"));
        let accept = ElicitResponse::accept(answers);
        let encoded = serde_json::to_value(&accept).unwrap();
        assert_eq!(encoded["action"], "accept");
        assert_eq!(encoded["content"]["name"], "Ada");
    }
}
