use crate::unit::common::*;
use chrono::NaiveDateTime;
use std::sync::Arc;
use velostream_schema::velostream::observability::Substitution;

#[derive(Debug, Clone, PartialEq)]
struct SensorReading {
    sensor: String,
    taken_at: NaiveDateTime,
}

impl Entity for SensorReading {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("SensorReading")
            .topic("readings")
            .field(FieldDescriptor::new("sensor", SemanticType::String).key())
            .field(FieldDescriptor::new("taken_at", SemanticType::LocalTimestamp))
            .build()
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("sensor".to_string(), self.sensor.as_str().into());
        record.insert("taken_at".to_string(), self.taken_at.into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            sensor: take_field(&mut record, "sensor")?.into_string("sensor")?,
            taken_at: take_field(&mut record, "taken_at")?.into_local_timestamp("taken_at")?,
        })
    }
}

/// No topic and a timezone-naive timestamp
#[derive(Debug, Clone, PartialEq)]
struct LegacyReading {
    sensor: String,
    taken_at: NaiveDateTime,
}

impl Entity for LegacyReading {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("LegacyReading")
            .field(FieldDescriptor::new("sensor", SemanticType::String).key())
            .field(FieldDescriptor::new("taken_at", SemanticType::LocalTimestamp))
            .build()
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("sensor".to_string(), self.sensor.as_str().into());
        record.insert("taken_at".to_string(), self.taken_at.into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            sensor: take_field(&mut record, "sensor")?.into_string("sensor")?,
            taken_at: take_field(&mut record, "taken_at")?.into_local_timestamp("taken_at")?,
        })
    }
}

#[tokio::test]
async fn test_strict_mode_rejects_incomplete_metadata() {
    init_logging();
    let registry = CountingRegistry::new();
    let sink = Arc::new(RecordingSink::default());
    let manager = SerializerCacheManager::builder(registry.clone())
        .validation_mode(ValidationMode::Strict)
        .sink(sink.clone())
        .build();

    match manager.get_serializers::<LegacyTrade>().await.unwrap_err() {
        SchemaError::MissingRequiredMetadata {
            type_name,
            requirements,
        } => {
            assert_eq!(type_name, "LegacyTrade");
            assert_eq!(requirements.len(), 3);
        }
        other => panic!("expected missing metadata, got {}", other),
    }

    // Nothing reached the registry and nothing was warned
    assert_eq!(registry.fetch_calls(), 0);
    assert!(sink.warnings().is_empty());
}

#[tokio::test]
async fn test_relaxed_mode_substitutes_defaults_with_one_warning() {
    let registry = CountingRegistry::new();
    let sink = Arc::new(RecordingSink::default());
    let manager = SerializerCacheManager::builder(registry.clone())
        .validation_mode(ValidationMode::Relaxed)
        .sink(sink.clone())
        .build();

    let pair = manager.get_serializers::<LegacyTrade>().await.unwrap();
    manager.invalidate::<LegacyTrade>();
    manager.get_serializers::<LegacyTrade>().await.unwrap();

    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    match &warnings[0] {
        ResolutionWarning::DefaultsSubstituted {
            type_name,
            substitutions,
            deprecated_fields,
        } => {
            assert_eq!(type_name, "LegacyTrade");
            assert!(deprecated_fields.is_empty());
            assert!(substitutions.contains(&Substitution {
                requirement: "key".to_string(),
                value: "symbol".to_string(),
            }));
            assert!(substitutions.contains(&Substitution {
                requirement: "topic".to_string(),
                value: "LegacyTrade".to_string(),
            }));
        }
        other => panic!("unexpected warning {}", other),
    }

    assert_eq!(pair.value_identity.subject, "LegacyTrade-value");
    let value = registry.inner.fetch_latest("LegacyTrade-value").await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&value.definition).unwrap();
    let price_type = &json["fields"][1]["type"];
    assert_eq!(price_type["logicalType"], "decimal");
    assert_eq!(price_type["precision"], 38);
    assert_eq!(price_type["scale"], 9);
}

#[tokio::test]
async fn test_naive_timestamps_warn_in_both_modes() {
    for mode in [ValidationMode::Strict, ValidationMode::Relaxed] {
        let registry = CountingRegistry::new();
        let sink = Arc::new(RecordingSink::default());
        let manager = SerializerCacheManager::builder(registry)
            .validation_mode(mode)
            .sink(sink.clone())
            .build();

        let reading = SensorReading {
            sensor: "s-1".to_string(),
            taken_at: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_milli_opt(12, 30, 0, 250)
                .unwrap(),
        };
        assert!(manager.validate_round_trip(&reading).await.unwrap());

        assert_eq!(
            sink.warnings(),
            vec![ResolutionWarning::DeprecatedTemporal {
                type_name: "SensorReading".to_string(),
                field: "taken_at".to_string(),
            }]
        );
    }
}

#[tokio::test]
async fn test_model_is_memoized_per_manager() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry);

    let first = manager.model_resolver().resolve::<Order>().unwrap();
    let second = manager.model_resolver().resolve::<Order>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(manager.model_resolver().cached_models(), 1);

    // Ignored fields stay in the model, flagged
    let note = first.fields.iter().find(|f| f.name == "note").unwrap();
    assert!(note.ignored);
    assert_eq!(first.key_fields().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["id"]);
}

#[tokio::test]
async fn test_relaxed_defaults_and_deprecation_share_one_warning() {
    let registry = CountingRegistry::new();
    let sink = Arc::new(RecordingSink::default());
    let manager = SerializerCacheManager::builder(registry)
        .validation_mode(ValidationMode::Relaxed)
        .sink(sink.clone())
        .build();

    let pair = manager.get_serializers::<LegacyReading>().await.unwrap();
    assert_eq!(pair.value_identity.subject, "LegacyReading-value");

    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    match &warnings[0] {
        ResolutionWarning::DefaultsSubstituted {
            substitutions,
            deprecated_fields,
            ..
        } => {
            assert_eq!(
                substitutions,
                &vec![Substitution {
                    requirement: "topic".to_string(),
                    value: "LegacyReading".to_string(),
                }]
            );
            assert_eq!(deprecated_fields, &vec!["taken_at".to_string()]);
        }
        other => panic!("unexpected warning {}", other),
    }
    assert!(warnings[0].to_string().contains("timezone-naive timestamp fields: taken_at"));
}
