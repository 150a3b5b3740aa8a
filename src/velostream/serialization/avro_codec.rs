//! Avro codec for entity records
//!
//! An [`AvroCodec`] is bound to one projection of an entity model and one
//! registered schema id. Conversion is driven by the model's field plan, so
//! every field knows its wire type up front instead of probing the parsed
//! Avro schema per value.
//!
//! Payloads use the registry wire framing: magic byte `0x00`, the schema id
//! as a big-endian `u32`, then the raw Avro datum (no container file header).

use apache_avro::{types::Value as AvroValue, Decimal as AvroDecimal, Schema as AvroSchema};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::error::{SerializationError, SerializationResult};
use super::types::{FieldValue, Record};
use crate::velostream::schema::generator::WireType;
use crate::velostream::schema::metadata::SemanticType;
use crate::velostream::schema::types::{EntityModel, FieldModel, Projection};
use crate::velostream::schema::version_resolver::BoundSchema;
use crate::velostream::schema::{SchemaError, SchemaResult};

/// First byte of every framed payload
pub const MAGIC_BYTE: u8 = 0x00;

/// Magic byte plus schema id
pub const HEADER_LEN: usize = 5;

/// Prefix an Avro datum with the wire header
pub fn frame(schema_id: u32, datum: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + datum.len());
    framed.push(MAGIC_BYTE);
    framed.extend_from_slice(&schema_id.to_be_bytes());
    framed.extend_from_slice(datum);
    framed
}

/// Split a framed payload into its schema id and Avro datum
pub fn unframe(payload: &[u8]) -> SerializationResult<(u32, &[u8])> {
    if payload.len() < HEADER_LEN {
        return Err(SerializationError::InvalidFraming {
            reason: format!(
                "payload of {} bytes is shorter than the {}-byte header",
                payload.len(),
                HEADER_LEN
            ),
        });
    }
    if payload[0] != MAGIC_BYTE {
        return Err(SerializationError::InvalidFraming {
            reason: format!("unknown magic byte 0x{:02x}", payload[0]),
        });
    }
    let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    Ok((id, &payload[HEADER_LEN..]))
}

/// How one field is written and read
#[derive(Debug, Clone)]
struct FieldPlan {
    name: String,
    semantic_type: SemanticType,
    wire: WireType,
    nullable: bool,
    max_length: Option<usize>,
}

impl FieldPlan {
    fn for_field(field: &FieldModel) -> SchemaResult<Self> {
        Ok(Self {
            name: field.name.clone(),
            semantic_type: field.semantic_type.clone(),
            wire: WireType::for_field(field)?,
            nullable: field.nullable,
            max_length: field.max_length,
        })
    }
}

/// Avro codec for one entity projection bound to one schema id
#[derive(Debug)]
pub struct AvroCodec {
    schema: AvroSchema,
    schema_id: u32,
    fields: Vec<FieldPlan>,
}

impl AvroCodec {
    /// Build the codec for `projection` of `model`, bound to `bound`'s schema and id
    pub fn for_projection(
        model: &EntityModel,
        projection: Projection,
        bound: &BoundSchema,
    ) -> SchemaResult<Self> {
        let schema = AvroSchema::parse_str(&bound.schema.definition).map_err(|e| {
            SchemaError::InvalidSchema {
                subject: bound.identity.subject.clone(),
                message: e.to_string(),
            }
        })?;

        let fields = model
            .projected_fields(projection)
            .into_iter()
            .map(FieldPlan::for_field)
            .collect::<SchemaResult<Vec<_>>>()?;

        Ok(Self {
            schema,
            schema_id: bound.identity.id,
            fields,
        })
    }

    /// Get the schema used by this codec
    pub fn schema(&self) -> &AvroSchema {
        &self.schema
    }

    pub fn schema_id(&self) -> u32 {
        self.schema_id
    }

    /// Encode a record into a framed payload
    pub fn serialize(&self, record: &Record) -> SerializationResult<Vec<u8>> {
        let datum = self.encode_datum(record)?;
        Ok(frame(self.schema_id, &datum))
    }

    /// Decode a framed payload written with this codec's schema id
    pub fn deserialize(&self, payload: &[u8]) -> SerializationResult<Record> {
        let (id, datum) = unframe(payload)?;
        if id != self.schema_id {
            return Err(SerializationError::SchemaIdMismatch {
                expected: self.schema_id,
                found: id,
            });
        }
        self.decode_datum(datum)
    }

    /// Encode a record to a raw Avro datum, without framing
    pub fn encode_datum(&self, record: &Record) -> SerializationResult<Vec<u8>> {
        let mut avro_fields = Vec::with_capacity(self.fields.len());
        for plan in &self.fields {
            let value = match record.get(&plan.name) {
                Some(value) => value,
                None if plan.nullable => &FieldValue::Null,
                None => {
                    return Err(SerializationError::MissingField {
                        field: plan.name.clone(),
                    })
                }
            };
            avro_fields.push((plan.name.clone(), to_avro(plan, value)?));
        }

        // Raw datum, not the Object Container File format: the schema travels by id
        apache_avro::to_avro_datum(&self.schema, AvroValue::Record(avro_fields))
            .map_err(|e| SerializationError::avro_error("Failed to encode Avro datum", e))
    }

    /// Decode a raw Avro datum, without framing
    pub fn decode_datum(&self, mut datum: &[u8]) -> SerializationResult<Record> {
        let avro_value = apache_avro::from_avro_datum(&self.schema, &mut datum, None)
            .map_err(|e| SerializationError::avro_error("Failed to decode Avro datum", e))?;

        let mut values: HashMap<String, AvroValue> = match avro_value {
            AvroValue::Record(fields) => fields.into_iter().collect(),
            other => {
                return Err(SerializationError::Avro {
                    message: format!("Expected Avro record, got {:?}", other),
                })
            }
        };

        let mut record = Record::with_capacity(self.fields.len());
        for plan in &self.fields {
            let value = values
                .remove(&plan.name)
                .ok_or_else(|| SerializationError::MissingField {
                    field: plan.name.clone(),
                })?;
            record.insert(plan.name.clone(), from_avro(plan, value)?);
        }
        Ok(record)
    }
}

fn to_avro(plan: &FieldPlan, value: &FieldValue) -> SerializationResult<AvroValue> {
    if value.is_null() {
        return if plan.nullable {
            Ok(AvroValue::Union(0, Box::new(AvroValue::Null)))
        } else {
            Err(mismatch(plan, value))
        };
    }

    let converted = match (plan.wire, value) {
        (WireType::Boolean, FieldValue::Boolean(b)) => AvroValue::Boolean(*b),
        (WireType::Int, FieldValue::Integer(i)) => {
            check_integer_range(plan, *i)?;
            AvroValue::Int(*i as i32)
        }
        (WireType::Long, FieldValue::Integer(i)) => {
            check_integer_range(plan, *i)?;
            AvroValue::Long(*i)
        }
        (WireType::Float, FieldValue::Float(f)) => {
            if f.is_finite() && f.abs() > f32::MAX as f64 {
                return Err(out_of_range(plan, f, "float"));
            }
            AvroValue::Float(*f as f32)
        }
        (WireType::Double, FieldValue::Float(f)) => AvroValue::Double(*f),
        (WireType::String, FieldValue::String(s)) => {
            check_length(plan, s.chars().count())?;
            AvroValue::String(s.clone())
        }
        (WireType::Bytes, FieldValue::Bytes(b)) => {
            check_length(plan, b.len())?;
            AvroValue::Bytes(b.clone())
        }
        (WireType::Decimal { precision, scale }, FieldValue::Decimal(d)) => {
            decimal_to_avro(plan, *d, precision, scale)?
        }
        (WireType::Date, FieldValue::Date(d)) => {
            let days = d.signed_duration_since(epoch_date()).num_days();
            let days = i32::try_from(days).map_err(|_| out_of_range(plan, d, "date"))?;
            AvroValue::Date(days)
        }
        (WireType::TimeMillis, FieldValue::Time(t)) => {
            let millis =
                t.num_seconds_from_midnight() * 1_000 + (t.nanosecond() / 1_000_000).min(999);
            AvroValue::TimeMillis(millis as i32)
        }
        (WireType::TimestampMillis, FieldValue::Timestamp(ts)) => {
            AvroValue::TimestampMillis(ts.timestamp_millis())
        }
        (WireType::TimestampMicros, FieldValue::Timestamp(ts)) => {
            AvroValue::TimestampMicros(ts.timestamp_micros())
        }
        (WireType::LocalTimestampMillis, FieldValue::LocalTimestamp(ts)) => {
            AvroValue::LocalTimestampMillis(ts.and_utc().timestamp_millis())
        }
        (WireType::LocalTimestampMicros, FieldValue::LocalTimestamp(ts)) => {
            AvroValue::LocalTimestampMicros(ts.and_utc().timestamp_micros())
        }
        _ => return Err(mismatch(plan, value)),
    };

    if plan.nullable {
        // Nullable fields are generated as ["null", T]
        Ok(AvroValue::Union(1, Box::new(converted)))
    } else {
        Ok(converted)
    }
}

fn from_avro(plan: &FieldPlan, value: AvroValue) -> SerializationResult<FieldValue> {
    let value = match value {
        AvroValue::Union(_, inner) => *inner,
        other => other,
    };

    let field_value = match (plan.wire, value) {
        (_, AvroValue::Null) if plan.nullable => FieldValue::Null,
        (WireType::Boolean, AvroValue::Boolean(b)) => FieldValue::Boolean(b),
        (WireType::Int, AvroValue::Int(i)) => FieldValue::Integer(i as i64),
        (WireType::Long, AvroValue::Long(l)) => FieldValue::Integer(l),
        (WireType::Float, AvroValue::Float(f)) => FieldValue::Float(f as f64),
        (WireType::Double, AvroValue::Double(d)) => FieldValue::Float(d),
        (WireType::String, AvroValue::String(s)) => FieldValue::String(s),
        (WireType::Bytes, AvroValue::Bytes(b)) => FieldValue::Bytes(b),
        (WireType::Decimal { scale, .. }, AvroValue::Decimal(d)) => {
            let bytes: Vec<u8> = (&d).try_into().map_err(|e| {
                SerializationError::avro_error("Failed to read decimal bytes", e)
            })?;
            let unscaled = from_twos_complement(&bytes)
                .ok_or_else(|| out_of_range(plan, format!("{} bytes", bytes.len()), "i128"))?;
            let decimal = Decimal::try_from_i128_with_scale(unscaled, scale)
                .map_err(|_| out_of_range(plan, unscaled, "decimal"))?;
            FieldValue::Decimal(decimal)
        }
        (WireType::Date, AvroValue::Date(days)) => {
            let date = epoch_date()
                .checked_add_signed(chrono::Duration::days(days as i64))
                .ok_or_else(|| out_of_range(plan, days, "date"))?;
            FieldValue::Date(date)
        }
        (WireType::TimeMillis, AvroValue::TimeMillis(millis)) => {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (millis / 1_000) as u32,
                ((millis % 1_000) * 1_000_000) as u32,
            )
            .ok_or_else(|| out_of_range(plan, millis, "time"))?;
            FieldValue::Time(time)
        }
        (WireType::TimestampMillis, AvroValue::TimestampMillis(millis)) => {
            FieldValue::Timestamp(utc_from_micros(plan, millis.saturating_mul(1_000))?)
        }
        (WireType::TimestampMicros, AvroValue::TimestampMicros(micros)) => {
            FieldValue::Timestamp(utc_from_micros(plan, micros)?)
        }
        (WireType::LocalTimestampMillis, AvroValue::LocalTimestampMillis(millis)) => {
            let instant = utc_from_micros(plan, millis.saturating_mul(1_000))?;
            FieldValue::LocalTimestamp(instant.naive_utc())
        }
        (WireType::LocalTimestampMicros, AvroValue::LocalTimestampMicros(micros)) => {
            FieldValue::LocalTimestamp(utc_from_micros(plan, micros)?.naive_utc())
        }
        (wire, other) => {
            return Err(SerializationError::type_mismatch(
                &plan.name,
                format!("{:?}", wire),
                format!("{:?}", other),
            ))
        }
    };
    Ok(field_value)
}

fn mismatch(plan: &FieldPlan, value: &FieldValue) -> SerializationError {
    SerializationError::type_mismatch(&plan.name, plan.semantic_type.to_string(), value.type_name())
}

fn out_of_range(plan: &FieldPlan, value: impl ToString, target: &str) -> SerializationError {
    SerializationError::ValueOutOfRange {
        field: plan.name.clone(),
        value: value.to_string(),
        target: target.to_string(),
    }
}

/// Integers are widened on the wire; the declared width still bounds the value
fn check_integer_range(plan: &FieldPlan, value: i64) -> SerializationResult<()> {
    let (min, max) = match plan.semantic_type {
        SemanticType::Int8 => (i8::MIN as i64, i8::MAX as i64),
        SemanticType::Int16 => (i16::MIN as i64, i16::MAX as i64),
        SemanticType::Int32 => (i32::MIN as i64, i32::MAX as i64),
        SemanticType::UInt8 => (0, u8::MAX as i64),
        SemanticType::UInt16 => (0, u16::MAX as i64),
        SemanticType::UInt32 => (0, u32::MAX as i64),
        _ => (i64::MIN, i64::MAX),
    };
    if value < min || value > max {
        return Err(out_of_range(plan, value, &plan.semantic_type.to_string()));
    }
    Ok(())
}

fn check_length(plan: &FieldPlan, length: usize) -> SerializationResult<()> {
    match plan.max_length {
        Some(max) if length > max => Err(SerializationError::ConstraintViolation {
            field: plan.name.clone(),
            constraint: format!("length {} exceeds max_length {}", length, max),
        }),
        _ => Ok(()),
    }
}

fn decimal_to_avro(
    plan: &FieldPlan,
    value: Decimal,
    precision: u32,
    scale: u32,
) -> SerializationResult<AvroValue> {
    let current = value.scale();
    let mantissa = value.mantissa();

    let unscaled = if scale >= current {
        10i128
            .checked_pow(scale - current)
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or_else(|| out_of_range(plan, value, &format!("decimal({}, {})", precision, scale)))?
    } else {
        let factor = 10i128.pow(current - scale);
        if mantissa % factor != 0 {
            return Err(SerializationError::ConstraintViolation {
                field: plan.name.clone(),
                constraint: format!("{} has more than {} fractional digits", value, scale),
            });
        }
        mantissa / factor
    };

    if let Some(limit) = 10u128.checked_pow(precision) {
        if unscaled.unsigned_abs() >= limit {
            return Err(out_of_range(
                plan,
                value,
                &format!("decimal({}, {})", precision, scale),
            ));
        }
    }

    Ok(AvroValue::Decimal(AvroDecimal::from(to_twos_complement(unscaled))))
}

/// Minimal big-endian two's complement bytes
fn to_twos_complement(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Drop redundant sign bytes, keeping the sign bit of the first kept byte
    while start < bytes.len() - 1 {
        let (head, next) = (bytes[start], bytes[start + 1]);
        if (head == 0x00 && next & 0x80 == 0) || (head == 0xFF && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

fn from_twos_complement(bytes: &[u8]) -> Option<i128> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > 16 {
        return None;
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut padded = [fill; 16];
    padded[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(padded))
}

/// 1970-01-01
fn epoch_date() -> NaiveDate {
    NaiveDate::default()
}

fn utc_from_micros(plan: &FieldPlan, micros: i64) -> SerializationResult<DateTime<Utc>> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| out_of_range(plan, micros, "timestamp"))
}
