//! Error types for entity serialization

use thiserror::Error;

/// Errors raised while encoding or decoding entity records
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
    /// Avro encoding/decoding failed
    #[error("Avro error: {message}")]
    Avro { message: String },

    /// A field required by the schema is absent from the record
    #[error("Missing field '{field}'")]
    MissingField { field: String },

    /// A field value does not match the declared semantic type
    #[error("Field '{field}' expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Numeric value does not fit the canonical wire type
    #[error("Field '{field}' value {value} is out of range for {target}")]
    ValueOutOfRange {
        field: String,
        value: String,
        target: String,
    },

    /// A declared constraint (max length, precision) was violated
    #[error("Field '{field}' violates constraint: {constraint}")]
    ConstraintViolation { field: String, constraint: String },

    /// Payload is not in the registry wire format
    #[error("Invalid wire framing: {reason}")]
    InvalidFraming { reason: String },

    /// Payload was written with a different schema than this decoder is bound to
    #[error("Schema id mismatch: expected {expected}, found {found}")]
    SchemaIdMismatch { expected: u32, found: u32 },

    /// Key encoding/decoding requested for an entity declared keyless
    #[error("Entity '{type_name}' is keyless")]
    KeylessEntity { type_name: String },
}

impl SerializationError {
    /// Helper to wrap an Avro library error with context
    pub fn avro_error(context: &str, err: apache_avro::Error) -> Self {
        Self::Avro {
            message: format!("{}: {}", context, err),
        }
    }

    /// Helper for type mismatches
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

pub type SerializationResult<T> = Result<T, SerializationError>;
