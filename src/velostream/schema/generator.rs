//! Schema Generator
//!
//! Deterministic mapping from an [`EntityModel`] projection to canonical Avro
//! schema JSON. The same model always yields byte-identical output, which is
//! what lets the version resolver detect drift by comparing text.

use super::error::{SchemaError, SchemaResult};
use super::metadata::{SemanticType, TemporalFormat};
use super::types::{EntityModel, FieldModel, Projection, Schema};
use serde_json::{json, Map, Value};

/// Canonical Avro representation of one semantic type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Decimal { precision: u32, scale: u32 },
    Date,
    TimeMillis,
    TimestampMillis,
    TimestampMicros,
    LocalTimestampMillis,
    LocalTimestampMicros,
}

impl WireType {
    /// Map a field to its wire type. Integer widths normalize upward.
    pub fn for_field(field: &FieldModel) -> SchemaResult<WireType> {
        let micros = field.format == Some(TemporalFormat::Micros);
        let wire = match &field.semantic_type {
            SemanticType::Boolean => WireType::Boolean,
            SemanticType::Int8
            | SemanticType::Int16
            | SemanticType::Int32
            | SemanticType::UInt8
            | SemanticType::UInt16 => WireType::Int,
            SemanticType::Int64 | SemanticType::UInt32 => WireType::Long,
            SemanticType::Float32 => WireType::Float,
            SemanticType::Float64 => WireType::Double,
            SemanticType::String => WireType::String,
            SemanticType::Bytes => WireType::Bytes,
            SemanticType::Decimal => {
                let p = field.precision.ok_or_else(|| SchemaError::UnsupportedFieldType {
                    field: field.name.clone(),
                    semantic_type: "Decimal without precision".to_string(),
                })?;
                WireType::Decimal {
                    precision: p.precision,
                    scale: p.scale,
                }
            }
            SemanticType::Date => WireType::Date,
            SemanticType::Time => WireType::TimeMillis,
            SemanticType::Timestamp if micros => WireType::TimestampMicros,
            SemanticType::Timestamp => WireType::TimestampMillis,
            SemanticType::LocalTimestamp if micros => WireType::LocalTimestampMicros,
            SemanticType::LocalTimestamp => WireType::LocalTimestampMillis,
            SemanticType::UInt64 | SemanticType::Other(_) => {
                return Err(SchemaError::UnsupportedFieldType {
                    field: field.name.clone(),
                    semantic_type: field.semantic_type.to_string(),
                });
            }
        };
        Ok(wire)
    }

    fn to_json(self) -> Value {
        match self {
            WireType::Boolean => json!("boolean"),
            WireType::Int => json!("int"),
            WireType::Long => json!("long"),
            WireType::Float => json!("float"),
            WireType::Double => json!("double"),
            WireType::String => json!("string"),
            WireType::Bytes => json!("bytes"),
            WireType::Decimal { precision, scale } => json!({
                "type": "bytes",
                "logicalType": "decimal",
                "precision": precision,
                "scale": scale,
            }),
            WireType::Date => logical("int", "date"),
            WireType::TimeMillis => logical("int", "time-millis"),
            WireType::TimestampMillis => logical("long", "timestamp-millis"),
            WireType::TimestampMicros => logical("long", "timestamp-micros"),
            WireType::LocalTimestampMillis => logical("long", "local-timestamp-millis"),
            WireType::LocalTimestampMicros => logical("long", "local-timestamp-micros"),
        }
    }
}

fn logical(base: &str, logical_type: &str) -> Value {
    json!({ "type": base, "logicalType": logical_type })
}

/// Stateless generator; kept as a type so callers can hold it alongside the resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaGenerator;

impl SchemaGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate the canonical schema for one projection of a model
    pub fn generate(&self, model: &EntityModel, projection: Projection) -> SchemaResult<Schema> {
        if projection == Projection::Key && model.is_keyless() {
            return Err(SchemaError::invalid_metadata(
                &model.record_name,
                "keyless entity has no key schema",
            ));
        }

        let mut fields = Vec::new();
        for field in model.projected_fields(projection) {
            fields.push(field_json(field)?);
        }

        let mut record = Map::new();
        record.insert("type".to_string(), json!("record"));
        record.insert(
            "name".to_string(),
            json!(model.projection_record_name(projection)),
        );
        if let Some(namespace) = &model.namespace {
            record.insert("namespace".to_string(), json!(namespace));
        }
        record.insert("fields".to_string(), Value::Array(fields));

        let definition = serde_json::to_string(&Value::Object(record)).map_err(|e| {
            SchemaError::InvalidSchema {
                subject: model.full_name(projection),
                message: e.to_string(),
            }
        })?;

        Ok(Schema::new(model.full_name(projection), definition))
    }

    /// Generate every schema the model publishes, key first
    pub fn generate_all(&self, model: &EntityModel) -> SchemaResult<Vec<(Projection, Schema)>> {
        model
            .projections()
            .into_iter()
            .map(|p| self.generate(model, p).map(|s| (p, s)))
            .collect()
    }
}

fn field_json(field: &FieldModel) -> SchemaResult<Value> {
    let wire = WireType::for_field(field)?.to_json();
    let mut entry = Map::new();
    entry.insert("name".to_string(), json!(field.name));
    if field.nullable {
        entry.insert("type".to_string(), json!(["null", wire]));
        entry.insert("default".to_string(), Value::Null);
    } else {
        entry.insert("type".to_string(), wire);
    }
    Ok(Value::Object(entry))
}
