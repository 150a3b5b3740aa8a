//! Serializer caching
//!
//! - [`SerializerCacheManager`]: per-type cache with single-flight resolution
//!   and atomic upgrade
//! - [`SerializerPair`]: the encoder/decoder pair handed to callers
//! - [`Statistics`]: per-type counters

pub mod manager;
pub mod pair;
pub mod statistics;

pub use manager::{
    CacheManagerBuilder, SchemaUpgrade, SerializerCacheManager, DEFAULT_RESOLUTION_TIMEOUT,
};
pub use pair::{EncodedRecord, EntityDecoder, EntityEncoder, SerializerPair};
pub use statistics::{CacheStatistics, Statistics};
