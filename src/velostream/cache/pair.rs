//! Serializer pairs
//!
//! A [`SerializerPair`] is the unit the cache hands out: an encoder and a
//! decoder for one entity type, both bound to the same resolved key/value
//! schema identities. Pairs are immutable; an upgrade builds a new pair and
//! swaps it in whole.

use chrono::{DateTime, Utc};
use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

use super::statistics::CacheStatistics;
use crate::velostream::schema::metadata::Entity;
use crate::velostream::schema::types::{EntityModel, Projection, SchemaIdentity, TypeIdentity};
use crate::velostream::schema::version_resolver::BoundSchema;
use crate::velostream::schema::SchemaResult;
use crate::velostream::serialization::{
    AvroCodec, Record, SerializationError, SerializationResult,
};

/// Framed key and value payloads for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    /// `None` for keyless entities
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

fn check_type<T: Entity>(bound: &TypeIdentity) -> SerializationResult<()> {
    if TypeId::of::<T>() == bound.id {
        Ok(())
    } else {
        Err(SerializationError::type_mismatch(
            "<entity>",
            bound.name,
            std::any::type_name::<T>(),
        ))
    }
}

fn keyless(type_identity: &TypeIdentity) -> SerializationError {
    SerializationError::KeylessEntity {
        type_name: type_identity.short_name().to_string(),
    }
}

/// Encodes entities of one type
#[derive(Debug)]
pub struct EntityEncoder {
    type_identity: TypeIdentity,
    key: Option<Arc<AvroCodec>>,
    value: Arc<AvroCodec>,
    stats: Arc<CacheStatistics>,
}

impl EntityEncoder {
    /// Encode key and value payloads
    pub fn encode<T: Entity>(&self, entity: &T) -> SerializationResult<EncodedRecord> {
        check_type::<T>(&self.type_identity)?;
        let started = Instant::now();

        let record = entity.to_record();
        let key = self
            .key
            .as_ref()
            .map(|codec| codec.serialize(&record))
            .transpose()?;
        let value = self.value.serialize(&record)?;

        self.stats.record_encode(started.elapsed());
        Ok(EncodedRecord { key, value })
    }

    /// Encode only the key payload
    pub fn encode_key<T: Entity>(&self, entity: &T) -> SerializationResult<Vec<u8>> {
        check_type::<T>(&self.type_identity)?;
        let codec = self
            .key
            .as_ref()
            .ok_or_else(|| keyless(&self.type_identity))?;
        let started = Instant::now();
        let bytes = codec.serialize(&entity.to_record())?;
        self.stats.record_encode(started.elapsed());
        Ok(bytes)
    }

    /// Encode an already flattened record as a value payload
    pub fn encode_record(&self, record: &Record) -> SerializationResult<Vec<u8>> {
        let started = Instant::now();
        let bytes = self.value.serialize(record)?;
        self.stats.record_encode(started.elapsed());
        Ok(bytes)
    }
}

/// Decodes payloads back into entities of one type
#[derive(Debug)]
pub struct EntityDecoder {
    type_identity: TypeIdentity,
    key: Option<Arc<AvroCodec>>,
    value: Arc<AvroCodec>,
    stats: Arc<CacheStatistics>,
}

impl EntityDecoder {
    /// Decode a value payload into an entity
    pub fn decode<T: Entity>(&self, payload: &[u8]) -> SerializationResult<T> {
        check_type::<T>(&self.type_identity)?;
        let started = Instant::now();
        let entity = T::from_record(self.value.deserialize(payload)?)?;
        self.stats.record_decode(started.elapsed());
        Ok(entity)
    }

    /// Decode a key payload into its key fields
    pub fn decode_key(&self, payload: &[u8]) -> SerializationResult<Record> {
        let codec = self
            .key
            .as_ref()
            .ok_or_else(|| keyless(&self.type_identity))?;
        let started = Instant::now();
        let record = codec.deserialize(payload)?;
        self.stats.record_decode(started.elapsed());
        Ok(record)
    }

    /// Decode a value payload without rebuilding the entity
    pub fn decode_record(&self, payload: &[u8]) -> SerializationResult<Record> {
        let started = Instant::now();
        let record = self.value.deserialize(payload)?;
        self.stats.record_decode(started.elapsed());
        Ok(record)
    }
}

/// Matched encoder and decoder bound to one set of schema identities
#[derive(Debug)]
pub struct SerializerPair {
    pub encoder: EntityEncoder,
    pub decoder: EntityDecoder,
    pub key_identity: Option<SchemaIdentity>,
    pub value_identity: SchemaIdentity,
    pub created_at: DateTime<Utc>,
}

impl SerializerPair {
    /// Build codecs for the model's projections. `key` must be present
    /// exactly when the model has key fields.
    pub fn build(
        model: &EntityModel,
        key: Option<&BoundSchema>,
        value: &BoundSchema,
        stats: Arc<CacheStatistics>,
    ) -> SchemaResult<Self> {
        let key_codec = key
            .map(|bound| AvroCodec::for_projection(model, Projection::Key, bound).map(Arc::new))
            .transpose()?;
        let value_codec = Arc::new(AvroCodec::for_projection(model, Projection::Value, value)?);

        Ok(Self {
            encoder: EntityEncoder {
                type_identity: model.type_identity,
                key: key_codec.clone(),
                value: value_codec.clone(),
                stats: stats.clone(),
            },
            decoder: EntityDecoder {
                type_identity: model.type_identity,
                key: key_codec,
                value: value_codec,
                stats,
            },
            key_identity: key.map(|bound| bound.identity.clone()),
            value_identity: value.identity.clone(),
            created_at: Utc::now(),
        })
    }

    pub fn is_keyless(&self) -> bool {
        self.key_identity.is_none()
    }
}
