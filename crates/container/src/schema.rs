//! Record schema embedded in every container header
//!
//! Schemas are small JSON documents:
//!
//! ```json
//! {
//!   "name": "click",
//!   "namespace": "ads.events",
//!   "fields": [
//!     {"name": "id", "type": "long"},
//!     {"name": "campaign", "type": "string", "optional": true}
//!   ]
//! }
//! ```
//!
//! Two schemas are compatible only if they are structurally equal; there is
//! no resolution or evolution. A file written with one schema is rolled away
//! rather than migrated when the configured schema changes.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodecError, Result};

/// Value type of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Long,
    Double,
    Boolean,
    /// Array of integers in `0..=255`
    Bytes,
    /// Any JSON value, including nested objects
    Any,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Long => value.is_i64() || value.is_u64(),
            FieldType::Double => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Bytes => value.as_array().is_some_and(|items| {
                items
                    .iter()
                    .all(|b| b.as_u64().is_some_and(|b| b <= u8::MAX as u64))
            }),
            FieldType::Any => true,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Bytes => "bytes",
            FieldType::Any => "any",
        }
    }
}

/// A named, typed field of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldType,

    /// Optional fields may be absent or `null`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl Field {
    /// Create a required field
    pub fn required(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    /// Create an optional field
    pub fn optional(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

/// Record schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub fields: Vec<Field>,
}

impl Schema {
    /// Build a schema from parts, checking it for consistency
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let schema = Self {
            name: name.into(),
            namespace: None,
            fields,
        };
        schema.check()?;
        Ok(schema)
    }

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Parse a schema from its JSON definition
    pub fn parse(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    /// Load a schema definition from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::parse(&json)
    }

    /// Namespace-qualified name (`namespace.name`, or `name` alone)
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.clone(),
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Canonical JSON encoding, as stored in container headers
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Check that a record conforms to this schema
    ///
    /// Records must be JSON objects carrying every required field with a
    /// value of the declared type. Unknown extra keys are rejected so that
    /// reading back under the embedded schema never yields surprises.
    pub fn validate(&self, record: &Value) -> Result<()> {
        let Some(object) = record.as_object() else {
            return Err(CodecError::violation(
                self.full_name(),
                "<record>",
                "is not a JSON object",
            ));
        };

        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.optional => {}
                None | Some(Value::Null) => {
                    return Err(CodecError::violation(
                        self.full_name(),
                        &field.name,
                        "is missing",
                    ));
                }
                Some(value) if !field.kind.accepts(value) => {
                    return Err(CodecError::violation(
                        self.full_name(),
                        &field.name,
                        format!("is not of type {}", field.kind.as_str()),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(unknown) = object.keys().find(|key| self.field(key).is_none()) {
            return Err(CodecError::violation(
                self.full_name(),
                unknown,
                "is not declared",
            ));
        }

        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CodecError::invalid_schema("name must not be empty"));
        }
        if self.fields.is_empty() {
            return Err(CodecError::invalid_schema(format!(
                "schema '{}' declares no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(CodecError::invalid_schema("field name must not be empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CodecError::invalid_schema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for Schema {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod schema_test;
