//! Entity metadata source.
//!
//! Entities describe their schema-relevant shape through an explicit
//! [`EntityDescriptor`] rather than runtime reflection. The descriptor is
//! plain data: field names, semantic types and the hints (key, ignore,
//! precision, format, max length) that drive model resolution.
//!
//! ```rust
//! use velostream_schema::velostream::schema::metadata::{
//!     EntityDescriptor, FieldDescriptor, SemanticType,
//! };
//!
//! let descriptor = EntityDescriptor::builder("Order")
//!     .namespace("com.example.orders")
//!     .topic("orders")
//!     .field(FieldDescriptor::new("id", SemanticType::Int64).key())
//!     .field(FieldDescriptor::new("amount", SemanticType::Decimal).precision(10, 2))
//!     .field(FieldDescriptor::new("note", SemanticType::String).ignore())
//!     .build();
//!
//! assert_eq!(descriptor.fields.len(), 3);
//! ```

use crate::velostream::serialization::{Record, SerializationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an entity field, independent of any wire encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Decimal,
    Date,
    Time,
    /// Timezone-aware instant
    Timestamp,
    /// Timezone-naive date-time, deprecated in favour of `Timestamp`
    LocalTimestamp,
    /// A type the metadata source could not classify
    Other(String),
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Other(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Precision/scale pair for decimal fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalPrecision {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalPrecision {
    pub fn new(precision: u32, scale: u32) -> Self {
        Self { precision, scale }
    }
}

impl fmt::Display for DecimalPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decimal({}, {})", self.precision, self.scale)
    }
}

/// Resolution of temporal fields on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemporalFormat {
    #[default]
    Millis,
    Micros,
}

/// Declared field of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    pub key: bool,
    pub ignore: bool,
    pub precision: Option<DecimalPrecision>,
    pub format: Option<TemporalFormat>,
    pub max_length: Option<usize>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            nullable: false,
            key: false,
            ignore: false,
            precision: None,
            format: None,
            max_length: None,
        }
    }

    /// Mark the field as part of the record key
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Exclude the field from every generated schema
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(DecimalPrecision::new(precision, scale));
        self
    }

    pub fn format(mut self, format: TemporalFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// Complete metadata description of an entity type
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Record name used in generated schemas
    pub name: String,
    pub namespace: Option<String>,
    /// Topic the entity is published to; the base of its subject names
    pub topic: Option<String>,
    /// Explicit "this entity has no key" designation
    pub keyless: bool,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn builder(name: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder {
            descriptor: EntityDescriptor {
                name: name.into(),
                namespace: None,
                topic: None,
                keyless: false,
                fields: Vec::new(),
            },
        }
    }

    /// Whether the descriptor carries any explicit key designation
    pub fn has_key_designation(&self) -> bool {
        self.keyless || self.fields.iter().any(|f| f.key)
    }
}

/// Builder for [`EntityDescriptor`]
#[derive(Debug, Clone)]
pub struct EntityDescriptorBuilder {
    descriptor: EntityDescriptor,
}

impl EntityDescriptorBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.descriptor.namespace = Some(namespace.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.descriptor.topic = Some(topic.into());
        self
    }

    pub fn keyless(mut self) -> Self {
        self.descriptor.keyless = true;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.descriptor.fields.push(field);
        self
    }

    pub fn build(self) -> EntityDescriptor {
        self.descriptor
    }
}

/// A strongly-typed entity that can be published through the engine.
///
/// Implementations describe their metadata once and convert to and from the
/// flattened [`Record`] form the codecs operate on.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Schema-relevant metadata. Must return the same description on every call.
    fn descriptor() -> EntityDescriptor;

    /// Flatten this instance. Ignored fields may be omitted.
    fn to_record(&self) -> Record;

    /// Rebuild an instance from a decoded record. Ignored fields are absent
    /// and should be restored to their defaults.
    fn from_record(record: Record) -> SerializationResult<Self>;
}
