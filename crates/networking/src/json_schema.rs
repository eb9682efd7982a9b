//! # JSON Schema
//!
//! A small, self-contained schema dialect used to describe and check
//! entrypoint payloads before they reach application logic. It covers the
//! subset the wire protocol needs (scalar types, objects with required
//! properties, homogeneous arrays, numeric bounds for documentation) rather
//! than any published JSON Schema draft.
//!
//! ## Validation
//!
//! [`validate`] walks value and schema together, depth-first. A type
//! mismatch is reported once and ends the descent into that subtree, so a
//! payload of the wrong shape produces one error per wrong branch instead
//! of a cascade. Properties the schema does not declare pass untouched,
//! which keeps old servers tolerant of newer clients.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Schema Types
// ============================================================================

/// The JSON type a schema constrains a value to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    /// Lowercase wire name, as used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// The type of a concrete JSON value. Whole numbers read back as
    /// `Integer` even when a client sent them with a decimal point stripped.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One node of a recursive schema description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Human-readable name, shown by client UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer description of the field's meaning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Expected JSON type; an untyped schema accepts anything.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<JsonType>,
    /// Child schemas of an object, keyed by property name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonSchema>,
    /// Names of properties that must be present on an object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Schema applied to every element of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    /// Lower bound for numeric values (documentation, not enforced).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Upper bound for numeric values (documentation, not enforced).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Accepted values for string-encoded enumerations.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    /// Whether the field is reported but rejected on write.
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
}

impl JsonSchema {
    /// A schema constraining only the JSON type.
    pub fn typed(kind: JsonType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// An array schema with one schema for all elements.
    pub fn array_of(items: JsonSchema) -> Self {
        Self {
            kind: Some(JsonType::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check `value` against `schema`, returning every violation found.
///
/// An empty result means the value conforms.
pub fn validate(value: &Value, schema: &JsonSchema) -> Vec<String> {
    let mut errors = Vec::new();
    validate_at(value, schema, "", &mut errors);
    errors
}

fn validate_at(value: &Value, schema: &JsonSchema, path: &str, errors: &mut Vec<String>) {
    let Some(expected) = schema.kind else {
        return;
    };
    let actual = JsonType::of(value);
    if !type_matches(actual, expected) {
        errors.push(type_error(path, expected, actual));
        return;
    }
    match expected {
        JsonType::Object => {
            let Some(object) = value.as_object() else {
                return;
            };
            for (name, child_schema) in &schema.properties {
                let child_path = join_path(path, name);
                match object.get(name) {
                    Some(child) => validate_at(child, child_schema, &child_path, errors),
                    None if schema.required.iter().any(|r| r == name) => {
                        errors.push(format!("Missing property: '{child_path}'"));
                    }
                    None => {}
                }
            }
        }
        JsonType::Array => {
            if let (Some(items), Some(elements)) = (&schema.items, value.as_array()) {
                for (index, element) in elements.iter().enumerate() {
                    let child_path = join_path(path, &format!("[{index}]"));
                    validate_at(element, items, &child_path, errors);
                }
            }
        }
        _ => {}
    }
}

/// Integers satisfy a `number` schema; the reverse does not hold.
fn type_matches(actual: JsonType, expected: JsonType) -> bool {
    actual == expected || (expected == JsonType::Number && actual == JsonType::Integer)
}

fn type_error(path: &str, expected: JsonType, actual: JsonType) -> String {
    if path.is_empty() {
        format!("Invalid type: expected '{expected}', got '{actual}'")
    } else {
        format!("Invalid type at '{path}': expected '{expected}', got '{actual}'")
    }
}

/// Join path segments with `.`, except array indices which attach directly.
fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if child.starts_with('[') {
        format!("{parent}{child}")
    } else {
        format!("{parent}.{child}")
    }
}

// ============================================================================
// Tests
// ============================================================================
