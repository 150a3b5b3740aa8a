//! Schema Evolution
//!
//! Avro record compatibility checking between a candidate schema and the
//! versions already registered under a subject. Used by the in-memory
//! registry to answer compatibility queries the way a real registry would.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::error::{SchemaError, SchemaResult};
use super::types::CompatibilityVerdict;

/// Subject compatibility level, named as the registry names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    None,
    /// New readers can read data written with the latest schema
    #[default]
    Backward,
    BackwardTransitive,
    /// Latest readers can read data written with the new schema
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
}

impl CompatibilityLevel {
    fn is_transitive(self) -> bool {
        matches!(
            self,
            CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::FullTransitive
        )
    }

    fn checks_backward(self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Backward
                | CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }

    fn checks_forward(self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Forward
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }
}

pub const READER_FIELD_MISSING_DEFAULT_VALUE: &str = "READER_FIELD_MISSING_DEFAULT_VALUE";
pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
pub const NAME_MISMATCH: &str = "NAME_MISMATCH";

/// A record field as seen by the compatibility rules
#[derive(Debug, Clone, PartialEq)]
struct AvroField {
    name: String,
    field_type: Value,
    has_default: bool,
}

/// A parsed Avro record schema
#[derive(Debug, Clone, PartialEq)]
struct AvroRecord {
    full_name: String,
    fields: Vec<AvroField>,
}

impl AvroRecord {
    fn parse(definition: &str) -> SchemaResult<Self> {
        let value: Value =
            serde_json::from_str(definition).map_err(|e| SchemaError::InvalidSchema {
                subject: String::new(),
                message: format!("Schema is not valid JSON: {}", e),
            })?;
        let object = value.as_object().ok_or_else(|| invalid("expected a record object"))?;
        if object.get("type").and_then(Value::as_str) != Some("record") {
            return Err(invalid("only record schemas are supported"));
        }

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("record has no name"))?;
        let full_name = match object.get("namespace").and_then(Value::as_str) {
            Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{}.{}", ns, name),
            _ => name.to_string(),
        };

        let fields = object
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("record has no fields array"))?
            .iter()
            .map(|field| {
                let name = field
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("field has no name"))?;
                let field_type = field
                    .get("type")
                    .ok_or_else(|| invalid("field has no type"))?;
                Ok(AvroField {
                    name: name.to_string(),
                    field_type: normalize(field_type),
                    has_default: field.get("default").is_some(),
                })
            })
            .collect::<SchemaResult<Vec<_>>>()?;

        Ok(Self { full_name, fields })
    }

    fn field(&self, name: &str) -> Option<&AvroField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn invalid(message: &str) -> SchemaError {
    SchemaError::InvalidSchema {
        subject: String::new(),
        message: message.to_string(),
    }
}

/// `{"type": "long"}` and `"long"` describe the same thing
fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(object) if object.len() == 1 => match object.get("type") {
            Some(inner @ Value::String(_)) => inner.clone(),
            _ => value.clone(),
        },
        Value::Array(branches) => Value::Array(branches.iter().map(normalize).collect()),
        _ => value.clone(),
    }
}

/// One difference that breaks compatibility in a given direction
#[derive(Debug, Clone, PartialEq)]
pub struct Incompatibility {
    pub category: &'static str,
    pub description: String,
}

/// Compatibility checker for one subject's compatibility level
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaEvolution {
    level: CompatibilityLevel,
}

impl SchemaEvolution {
    pub fn new(level: CompatibilityLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompatibilityLevel {
        self.level
    }

    /// Check `candidate` against the registered versions of a subject,
    /// ordered oldest to newest. An empty history is always compatible.
    pub fn check(&self, history: &[&str], candidate: &str) -> SchemaResult<CompatibilityVerdict> {
        if self.level == CompatibilityLevel::None || history.is_empty() {
            return Ok(CompatibilityVerdict::compatible());
        }

        let candidate = AvroRecord::parse(candidate)?;
        let against: &[&str] = if self.level.is_transitive() {
            history
        } else {
            &history[history.len() - 1..]
        };

        let mut problems = Vec::new();
        for existing in against {
            let existing = AvroRecord::parse(existing)?;
            if self.level.checks_backward() {
                problems.extend(read_problems(&existing, &candidate));
            }
            if self.level.checks_forward() {
                problems.extend(read_problems(&candidate, &existing));
            }
        }

        match problems.first() {
            None => Ok(CompatibilityVerdict::compatible()),
            Some(first) => {
                let category = first.category;
                let messages = problems
                    .iter()
                    .map(|p| format!("{{errorType:'{}', description:'{}'}}", p.category, p.description))
                    .collect();
                Ok(CompatibilityVerdict::incompatible(category, messages))
            }
        }
    }
}

/// Problems a reader with schema `reader` hits reading data written with `writer`
fn read_problems(writer: &AvroRecord, reader: &AvroRecord) -> Vec<Incompatibility> {
    let mut problems = Vec::new();

    if writer.full_name != reader.full_name {
        problems.push(Incompatibility {
            category: NAME_MISMATCH,
            description: format!(
                "The reader record name '{}' does not match the writer record name '{}'",
                reader.full_name, writer.full_name
            ),
        });
    }

    for (index, field) in reader.fields.iter().enumerate() {
        match writer.field(&field.name) {
            None if !field.has_default => problems.push(Incompatibility {
                category: READER_FIELD_MISSING_DEFAULT_VALUE,
                description: format!(
                    "The field '{}' at path '/fields/{}' has no default value and is missing in the writer schema",
                    field.name, index
                ),
            }),
            None => {}
            Some(written) if !readable(&written.field_type, &field.field_type) => {
                problems.push(Incompatibility {
                    category: TYPE_MISMATCH,
                    description: format!(
                        "The type of field '{}' at path '/fields/{}' changed from {} to {}",
                        field.name, index, written.field_type, field.field_type
                    ),
                })
            }
            Some(_) => {}
        }
    }

    problems
}

/// Whether a value written as `writer` can be read as `reader`
fn readable(writer: &Value, reader: &Value) -> bool {
    if writer == reader {
        return true;
    }
    match (writer, reader) {
        (Value::Array(branches), _) => branches.iter().all(|w| readable(w, reader)),
        (_, Value::Array(branches)) => branches.iter().any(|r| readable(writer, r)),
        (Value::String(w), Value::String(r)) => promotable(w, r),
        (Value::Object(w), Value::Object(r)) => same_logical(w, r),
        _ => false,
    }
}

fn promotable(writer: &str, reader: &str) -> bool {
    matches!(
        (writer, reader),
        ("int", "long")
            | ("int", "float")
            | ("int", "double")
            | ("long", "float")
            | ("long", "double")
            | ("float", "double")
            | ("string", "bytes")
            | ("bytes", "string")
    )
}

fn same_logical(writer: &Map<String, Value>, reader: &Map<String, Value>) -> bool {
    let keys = ["type", "logicalType", "precision", "scale"];
    let pick = |m: &Map<String, Value>| -> HashMap<&str, Value> {
        keys.iter()
            .filter_map(|k| m.get(*k).map(|v| (*k, v.clone())))
            .collect()
    };
    pick(writer) == pick(reader)
}
