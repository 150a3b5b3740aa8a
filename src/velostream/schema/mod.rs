//! Schema Resolution
//!
//! Everything between an entity type and a registered Avro schema:
//!
//! - **Metadata** (`schema::metadata`): the [`Entity`] trait and the
//!   descriptor builder entities use to declare their shape
//! - **Model Resolver**: validates metadata under a [`ValidationMode`] and
//!   memoizes one [`EntityModel`] per type
//! - **Generator**: deterministic Avro JSON per key/value projection
//! - **Registry Clients** (`schema::client`): the [`RegistryClient`] seam
//!   with HTTP and in-memory implementations
//! - **Version Resolver**: reconciles generated schemas with the registry,
//!   detecting drift and applying explicit upgrades
//! - **Startup**: registry connectivity probe

// Core types and errors
pub mod error;
pub mod metadata;
pub mod types;

// Model and schema derivation
pub mod generator;
pub mod model_resolver;

// Registry interaction
pub mod client;
pub mod evolution;
pub mod startup;
pub mod version_resolver;

// Re-export commonly used types
pub use client::{AuthConfig, HttpRegistryClient, InMemoryRegistryClient, RegistryClient};
pub use error::{SchemaError, SchemaResult};
pub use evolution::{CompatibilityLevel, SchemaEvolution};
pub use generator::{SchemaGenerator, WireType};
pub use metadata::{
    DecimalPrecision, Entity, EntityDescriptor, FieldDescriptor, SemanticType, TemporalFormat,
};
pub use model_resolver::EntityModelResolver;
pub use startup::{check_registry_connectivity, StartupConfig};
pub use types::{
    CompatibilityVerdict, EntityModel, FieldModel, Projection, RegisteredSchema, Schema,
    SchemaIdentity, SubjectNameStrategy, TypeIdentity, UpgradeResult, ValidationMode,
};
pub use version_resolver::{BoundSchema, SchemaVersionResolver};
