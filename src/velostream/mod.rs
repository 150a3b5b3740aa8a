pub mod cache;
pub mod config;
pub mod observability;
pub mod schema;
pub mod serialization;

// Re-export the caller-facing surface
pub use cache::{SerializerCacheManager, SerializerPair, Statistics};
pub use config::SchemaEngineConfig;
pub use observability::{LogSink, NullSink, ResolutionWarning, TelemetrySink};
pub use schema::{Entity, EntityDescriptor, FieldDescriptor, SchemaError, ValidationMode};
