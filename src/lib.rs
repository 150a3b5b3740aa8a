//! # velostream-schema
//!
//! Entity schema resolution and serializer caching for Avro payloads framed
//! for a Confluent-compatible schema registry.
//!
//! Entity types describe themselves through the [`Entity`] trait. The
//! [`SerializerCacheManager`] turns that metadata into key/value Avro
//! schemas, reconciles them with the registry and hands back a cached
//! encoder/decoder pair per type.
//!
//! ## Features
//!
//! - **Metadata Validation**: strict or relaxed handling of incomplete entity declarations
//! - **Deterministic Schemas**: byte-identical Avro JSON per key/value projection
//! - **Drift Detection**: generated schemas are compared with the registry, never silently upgraded
//! - **Single-flight Caching**: concurrent first requests for a type share one resolution
//! - **Explicit Upgrades**: atomic swap of a type's serializer pair
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use velostream_schema::velostream::schema::{
//!     Entity, EntityDescriptor, FieldDescriptor, HttpRegistryClient, SemanticType,
//! };
//! use velostream_schema::velostream::serialization::{
//!     take_field, Record, SerializationResult,
//! };
//! use velostream_schema::velostream::SerializerCacheManager;
//! use rust_decimal::Decimal;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Order {
//!     id: i64,
//!     amount: Decimal,
//! }
//!
//! impl Entity for Order {
//!     fn descriptor() -> EntityDescriptor {
//!         EntityDescriptor::builder("Order")
//!             .topic("orders")
//!             .field(FieldDescriptor::new("id", SemanticType::Int64).key())
//!             .field(FieldDescriptor::new("amount", SemanticType::Decimal).precision(10, 2))
//!             .build()
//!     }
//!
//!     fn to_record(&self) -> Record {
//!         let mut record = Record::new();
//!         record.insert("id".to_string(), self.id.into());
//!         record.insert("amount".to_string(), self.amount.into());
//!         record
//!     }
//!
//!     fn from_record(mut record: Record) -> SerializationResult<Self> {
//!         Ok(Self {
//!             id: take_field(&mut record, "id")?.into_i64("id")?,
//!             amount: take_field(&mut record, "amount")?.into_decimal("amount")?,
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(HttpRegistryClient::new("http://localhost:8081"));
//!     let manager = SerializerCacheManager::new(client);
//!
//!     let pair = manager.get_serializers::<Order>().await?;
//!     let encoded = pair.encoder.encode(&Order { id: 1, amount: Decimal::new(1999, 2) })?;
//!     let decoded: Order = pair.decoder.decode(&encoded.value)?;
//!     assert_eq!(decoded.id, 1);
//!     Ok(())
//! }
//! ```

#![allow(clippy::derivable_impls)]
#![allow(clippy::large_enum_variant)]

pub mod velostream;

pub use velostream::{
    Entity, EntityDescriptor, FieldDescriptor, LogSink, NullSink, ResolutionWarning,
    SchemaEngineConfig, SchemaError, SerializerCacheManager, SerializerPair, Statistics,
    TelemetrySink, ValidationMode,
};
