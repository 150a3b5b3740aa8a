//! Entity serialization
//!
//! Entities are flattened to a [`Record`] and encoded with an [`AvroCodec`]
//! bound to a registered schema id.

pub mod avro_codec;
pub mod error;
pub mod types;

pub use avro_codec::{frame, unframe, AvroCodec, HEADER_LEN, MAGIC_BYTE};
pub use error::{SerializationError, SerializationResult};
pub use types::{take_field, FieldValue, Record};
