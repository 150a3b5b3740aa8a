//! Schema Error Types
//!
//! Closed error taxonomy for entity model resolution, schema generation and
//! registry reconciliation. Errors are `Clone` because a single in-flight
//! resolution hands the same failure to every caller waiting on it.

use super::types::SchemaIdentity;
use std::time::Duration;
use thiserror::Error;

/// Error types for schema management operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Strict validation found required metadata missing from an entity
    #[error("Entity '{type_name}' is missing required metadata: {}", .requirements.join(", "))]
    MissingRequiredMetadata {
        type_name: String,
        requirements: Vec<String>,
    },

    /// Entity metadata is structurally invalid regardless of validation mode
    #[error("Entity '{type_name}' has invalid metadata: {reason}")]
    InvalidMetadata { type_name: String, reason: String },

    /// A field's semantic type has no canonical wire mapping
    #[error("Field '{field}' has unsupported type {semantic_type}")]
    UnsupportedFieldType {
        field: String,
        semantic_type: String,
    },

    /// The registry could not be reached
    #[error("Schema registry unavailable during {operation}: {message}")]
    RegistryUnavailable { operation: String, message: String },

    /// The registry answered with a non-success status other than "not found"
    #[error("Schema registry rejected {operation} with status {status}: {message}")]
    RegistryRejected {
        operation: String,
        status: u16,
        message: String,
    },

    /// The subject has never been registered
    #[error("Subject '{subject}' not found in schema registry")]
    SubjectNotFound { subject: String },

    /// The locally generated schema differs from the registered one
    #[error(
        "Schema drift detected for subject '{subject}' (registered id {} version {}); an explicit upgrade is required",
        .registered.id,
        .registered.version
    )]
    SchemaDriftDetected {
        subject: String,
        registered: SchemaIdentity,
    },

    /// The registry refused the candidate schema under its compatibility rules
    #[error("Incompatible schema evolution for subject '{subject}': {category}")]
    IncompatibleSchemaEvolution {
        subject: String,
        category: String,
        messages: Vec<String>,
    },

    /// A schema could not be parsed into a codec
    #[error("Invalid schema for subject '{subject}': {message}")]
    InvalidSchema { subject: String, message: String },

    /// The single-flight resolution exceeded its time budget
    #[error("Resolution of '{type_name}' timed out after {timeout:?}")]
    ResolutionTimedOut { type_name: String, timeout: Duration },
}

impl SchemaError {
    /// Helper to create registry transport errors
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegistryUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Helper to create metadata errors
    pub fn invalid_metadata(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure should stop the process at startup rather than
    /// being handled per operation.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            SchemaError::RegistryUnavailable { .. }
                | SchemaError::MissingRequiredMetadata { .. }
                | SchemaError::InvalidMetadata { .. }
                | SchemaError::UnsupportedFieldType { .. }
        )
    }
}

pub type SchemaResult<T> = Result<T, SchemaError>;
