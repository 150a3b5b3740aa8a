//! Core schema types: entity models, generated schemas, registry identities.

use super::metadata::{DecimalPrecision, SemanticType, TemporalFormat};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;

/// Stable identity of an entity's Rust type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIdentity {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeIdentity {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Last path segment of the type name, without generic arguments
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Process-wide strictness policy for model resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Missing metadata is an error; defaults are never substituted
    #[default]
    Strict,
    /// Missing metadata is replaced by deterministic defaults with a warning
    Relaxed,
}

/// Which part of a record a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    Key,
    Value,
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Key => write!(f, "key"),
            Projection::Value => write!(f, "value"),
        }
    }
}

/// A resolved field of an entity model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub name: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    pub precision: Option<DecimalPrecision>,
    pub format: Option<TemporalFormat>,
    pub max_length: Option<usize>,
    pub ignored: bool,
}

/// Canonical description of an entity type's schema-relevant shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    pub type_identity: TypeIdentity,
    pub record_name: String,
    pub namespace: Option<String>,
    /// Topic the subject names are derived from
    pub subject_base: String,
    pub fields: Vec<FieldModel>,
    /// Indexes into `fields`, ascending
    pub key_fields: Vec<usize>,
}

impl EntityModel {
    pub fn is_keyless(&self) -> bool {
        self.key_fields.is_empty()
    }

    pub fn key_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.key_fields.iter().map(move |&i| &self.fields[i])
    }

    /// Fields emitted for a projection, in declaration order
    pub fn projected_fields(&self, projection: Projection) -> Vec<&FieldModel> {
        match projection {
            Projection::Key => self.key_fields().collect(),
            Projection::Value => self.fields.iter().filter(|f| !f.ignored).collect(),
        }
    }

    /// Record name used for a projection's schema
    pub fn projection_record_name(&self, projection: Projection) -> String {
        match projection {
            Projection::Key => format!("{}Key", self.record_name),
            Projection::Value => self.record_name.clone(),
        }
    }

    /// Fully qualified record name for a projection
    pub fn full_name(&self, projection: Projection) -> String {
        let name = self.projection_record_name(projection);
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name,
        }
    }

    /// Projections this entity publishes schemas for
    pub fn projections(&self) -> Vec<Projection> {
        if self.is_keyless() {
            vec![Projection::Value]
        } else {
            vec![Projection::Key, Projection::Value]
        }
    }
}

/// Naming strategy mapping an entity projection to a registry subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectNameStrategy {
    /// `{topic}-key` / `{topic}-value`
    #[default]
    TopicName,
    /// Fully qualified record name
    RecordName,
    /// `{topic}-{fully qualified record name}`
    TopicRecordName,
}

impl SubjectNameStrategy {
    pub fn subject(&self, model: &EntityModel, projection: Projection) -> String {
        match self {
            SubjectNameStrategy::TopicName => format!("{}-{}", model.subject_base, projection),
            SubjectNameStrategy::RecordName => model.full_name(projection),
            SubjectNameStrategy::TopicRecordName => {
                format!("{}-{}", model.subject_base, model.full_name(projection))
            }
        }
    }
}

/// Canonical, versionless schema text for one projection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    /// Fully qualified record name
    pub name: String,
    /// Canonical Avro JSON
    pub definition: String,
}

impl Schema {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }

    /// Two schemas describe the same shape: byte-identical text, or
    /// structurally equal JSON (registries re-serialize what they store).
    pub fn same_definition(&self, other: &str) -> bool {
        if self.definition == other {
            return true;
        }
        match (
            serde_json::from_str::<serde_json::Value>(&self.definition),
            serde_json::from_str::<serde_json::Value>(other),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition)
    }
}

/// `(subject, id, version)` assigned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaIdentity {
    pub subject: String,
    pub id: u32,
    pub version: i32,
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {}, v{})", self.subject, self.id, self.version)
    }
}

/// Latest registered schema for a subject
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredSchema {
    pub identity: SchemaIdentity,
    pub definition: String,
}

/// Registry answer to a compatibility query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompatibilityVerdict {
    pub is_compatible: bool,
    /// Incompatibility category reported by the registry, when any
    pub category: Option<String>,
    pub messages: Vec<String>,
}

impl CompatibilityVerdict {
    pub fn compatible() -> Self {
        Self {
            is_compatible: true,
            category: None,
            messages: Vec::new(),
        }
    }

    pub fn incompatible(category: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            is_compatible: false,
            category: Some(category.into()),
            messages,
        }
    }
}

/// Outcome of upgrading one subject
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeResult {
    pub success: bool,
    /// `None` when the subject had never been registered
    pub old_identity: Option<SchemaIdentity>,
    pub new_identity: SchemaIdentity,
}

impl UpgradeResult {
    /// Whether the registry assigned a new schema id
    pub fn changed(&self) -> bool {
        self.old_identity.as_ref().map(|old| old.id) != Some(self.new_identity.id)
    }
}
