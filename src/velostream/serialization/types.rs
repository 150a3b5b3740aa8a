//! Field values exchanged between entities and codecs.
//!
//! An entity is flattened into a [`Record`] (field name → [`FieldValue`]) before
//! encoding and rebuilt from one after decoding. The variants mirror the
//! semantic types an entity can declare, so a record can always be checked
//! against the entity model without consulting the wire schema.

use super::error::{SerializationError, SerializationResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

/// Flattened entity representation
pub type Record = HashMap<String, FieldValue>;

/// A value in an entity record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value for a nullable field
    Null,
    /// Boolean value
    Boolean(bool),
    /// Any integer width, widened to 64 bits
    Integer(i64),
    /// Any floating point width, widened to 64 bits
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// Exact decimal
    Decimal(Decimal),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Timezone-aware instant
    Timestamp(DateTime<Utc>),
    /// Timezone-naive date-time (deprecated representation)
    LocalTimestamp(NaiveDateTime),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::Time(t) => write!(f, "{}", t),
            FieldValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::LocalTimestamp(t) => write!(f, "{}", t),
        }
    }
}

macro_rules! into_variant {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        $(#[$doc])*
        pub fn $fn_name(self, field: &str) -> SerializationResult<$ty> {
            match self {
                FieldValue::$variant(v) => Ok(v),
                other => Err(SerializationError::type_mismatch(
                    field,
                    $expected,
                    other.type_name(),
                )),
            }
        }
    };
}

impl FieldValue {
    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "NULL",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::String(_) => "STRING",
            FieldValue::Bytes(_) => "BYTES",
            FieldValue::Decimal(_) => "DECIMAL",
            FieldValue::Date(_) => "DATE",
            FieldValue::Time(_) => "TIME",
            FieldValue::Timestamp(_) => "TIMESTAMP",
            FieldValue::LocalTimestamp(_) => "LOCAL_TIMESTAMP",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    into_variant!(into_bool, Boolean, bool, "BOOLEAN");
    into_variant!(into_i64, Integer, i64, "INTEGER");
    into_variant!(into_f64, Float, f64, "FLOAT");
    into_variant!(into_string, String, String, "STRING");
    into_variant!(into_bytes, Bytes, Vec<u8>, "BYTES");
    into_variant!(into_decimal, Decimal, Decimal, "DECIMAL");
    into_variant!(into_date, Date, NaiveDate, "DATE");
    into_variant!(into_time, Time, NaiveTime, "TIME");
    into_variant!(into_timestamp, Timestamp, DateTime<Utc>, "TIMESTAMP");
    into_variant!(
        /// Timezone-naive timestamps are kept only for entities that still declare them
        into_local_timestamp,
        LocalTimestamp,
        NaiveDateTime,
        "LOCAL_TIMESTAMP"
    );

    /// Narrow an integer value, failing when it does not fit the target width
    pub fn into_int<T>(self, field: &str) -> SerializationResult<T>
    where
        T: TryFrom<i64>,
    {
        let value = self.into_i64(field)?;
        T::try_from(value).map_err(|_| SerializationError::ValueOutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            target: std::any::type_name::<T>().to_string(),
        })
    }

    /// Map a nullable field: `Null` becomes `None`, anything else goes through `convert`
    pub fn into_option<T, F>(self, convert: F) -> SerializationResult<Option<T>>
    where
        F: FnOnce(FieldValue) -> SerializationResult<T>,
    {
        match self {
            FieldValue::Null => Ok(None),
            other => convert(other).map(Some),
        }
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

macro_rules! from_primitive {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

from_primitive!(
    bool => Boolean,
    i8 => Integer as i64,
    i16 => Integer as i64,
    i32 => Integer as i64,
    i64 => Integer,
    u8 => Integer as i64,
    u16 => Integer as i64,
    u32 => Integer as i64,
    f32 => Float as f64,
    f64 => Float,
    String => String,
    Vec<u8> => Bytes,
    Decimal => Decimal,
    NaiveDate => Date,
    NaiveTime => Time,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => LocalTimestamp,
);

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// Remove a field from a record, failing if it is absent
pub fn take_field(record: &mut Record, field: &str) -> SerializationResult<FieldValue> {
    record
        .remove(field)
        .ok_or_else(|| SerializationError::MissingField {
            field: field.to_string(),
        })
}
