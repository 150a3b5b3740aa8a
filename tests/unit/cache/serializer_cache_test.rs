use crate::unit::common::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use velostream_schema::velostream::serialization::{unframe, MAGIC_BYTE};

#[tokio::test]
async fn test_order_first_request_resolves_then_hits() {
    init_logging();
    let registry = CountingRegistry::new();
    let manager = manager_with(registry.clone());

    let first = manager.get_serializers::<Order>().await.unwrap();
    let second = manager.get_serializers::<Order>().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let stats = manager.get_statistics::<Order>();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
    assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);

    assert_eq!(
        registry.inner.list_subjects().await.unwrap(),
        vec!["orders-key".to_string(), "orders-value".to_string()]
    );
    // One fetch and one register per subject, nothing on the hit
    assert_eq!(registry.fetch_calls(), 2);
    assert_eq!(registry.register_calls(), 2);
}

#[tokio::test]
async fn test_order_schemas_exclude_ignored_field() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry.clone());
    let pair = manager.get_serializers::<Order>().await.unwrap();

    let value = registry.inner.fetch_latest("orders-value").await.unwrap();
    let value_json: serde_json::Value = serde_json::from_str(&value.definition).unwrap();
    let names: Vec<&str> = value_json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["id", "amount"]);
    assert_eq!(value_json["name"], "Order");
    assert_eq!(value_json["namespace"], "com.example.orders");

    let key = registry.inner.fetch_latest("orders-key").await.unwrap();
    let key_json: serde_json::Value = serde_json::from_str(&key.definition).unwrap();
    let key_fields = key_json["fields"].as_array().unwrap();
    assert_eq!(key_fields.len(), 1);
    assert_eq!(key_fields[0]["name"], "id");

    assert_eq!(pair.value_identity, value.identity);
    assert_eq!(pair.key_identity.as_ref(), Some(&key.identity));
}

#[tokio::test]
async fn test_encoded_payloads_are_framed_with_schema_ids() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry);
    let pair = manager.get_serializers::<Order>().await.unwrap();

    let encoded = pair.encoder.encode(&Order::sample(42)).unwrap();
    let key = encoded.key.clone().unwrap();

    assert_eq!(encoded.value[0], MAGIC_BYTE);
    let (value_id, _) = unframe(&encoded.value).unwrap();
    assert_eq!(value_id, pair.value_identity.id);
    let (key_id, _) = unframe(&key).unwrap();
    assert_eq!(key_id, pair.key_identity.as_ref().unwrap().id);

    let decoded: Order = pair.decoder.decode(&encoded.value).unwrap();
    assert_eq!(decoded.id, 42);
    assert_eq!(decoded.amount, Decimal::new(1999, 2));
    // Ignored on the wire, restored to its default
    assert_eq!(decoded.note, "");

    let key_record = pair.decoder.decode_key(&key).unwrap();
    assert_eq!(key_record.len(), 1);
    assert_eq!(key_record.get("id"), Some(&FieldValue::Integer(42)));

    let stats = manager.get_statistics::<Order>();
    assert_eq!(stats.total_encodes, 1);
    assert_eq!(stats.total_decodes, 2);
}

#[tokio::test]
async fn test_keyless_entity_publishes_value_subject_only() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry.clone());

    let pair = manager.get_serializers::<Heartbeat>().await.unwrap();
    assert!(pair.is_keyless());
    assert_eq!(
        registry.inner.list_subjects().await.unwrap(),
        vec!["heartbeats-value".to_string()]
    );

    let heartbeat = Heartbeat {
        host: "node-1".to_string(),
        sequence: 7,
    };
    let encoded = pair.encoder.encode(&heartbeat).unwrap();
    assert!(encoded.key.is_none());
    assert!(pair.encoder.encode_key(&heartbeat).is_err());
}

#[tokio::test]
async fn test_round_trip_validation() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry);

    assert!(manager.validate_round_trip(&Order::sample(1)).await.unwrap());
    // `note` does not survive the trip
    let mut with_note = Order::sample(2);
    with_note.note = "dropped".to_string();
    assert!(!manager.validate_round_trip(&with_note).await.unwrap());
    // Constraint violation while encoding is a failed trip, not an error
    let too_long = Heartbeat {
        host: "h".repeat(65),
        sequence: 1,
    };
    assert!(!manager.validate_round_trip(&too_long).await.unwrap());
}

#[tokio::test]
async fn test_deserializers_share_the_serializer_pair() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry);

    let serializers = manager.get_serializers::<Order>().await.unwrap();
    let deserializers = manager.get_deserializers::<Order>().await.unwrap();
    assert!(Arc::ptr_eq(&serializers, &deserializers));
}

#[tokio::test]
async fn test_failed_resolution_leaves_no_entry() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry.clone());

    registry.inner.set_available(false);
    let err = manager.get_serializers::<Order>().await.unwrap_err();
    assert!(matches!(err, SchemaError::RegistryUnavailable { .. }));
    assert!(manager.cached_types().is_empty());

    registry.inner.set_available(true);
    let pair = manager.get_serializers::<Order>().await.unwrap();
    assert_eq!(pair.value_identity.subject, "orders-value");
    assert_eq!(manager.cached_types().len(), 1);

    let stats = manager.get_statistics::<Order>();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 0);
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry.clone());

    let first = manager.get_serializers::<Order>().await.unwrap();
    manager.get_serializers::<Heartbeat>().await.unwrap();
    assert_eq!(manager.cached_types().len(), 2);

    assert!(manager.invalidate::<Order>());
    assert!(!manager.invalidate::<Order>());
    assert_eq!(manager.cached_types().len(), 1);

    // Re-resolution reuses the registered identities
    let second = manager.get_serializers::<Order>().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.value_identity, second.value_identity);
    assert_eq!(registry.inner.versions("orders-value").len(), 1);
    assert_eq!(manager.get_statistics::<Order>().cache_misses, 2);

    manager.clear();
    assert!(manager.cached_types().is_empty());
    assert_eq!(manager.get_statistics::<Order>(), Statistics::default());
    assert_eq!(manager.get_statistics::<Heartbeat>(), Statistics::default());
}

#[tokio::test]
async fn test_types_are_isolated() {
    let registry = CountingRegistry::new();
    let manager = manager_with(registry.clone());

    registry.inner.set_available(false);
    assert!(manager.get_serializers::<Heartbeat>().await.is_err());
    registry.inner.set_available(true);

    manager.get_serializers::<Order>().await.unwrap();
    assert_eq!(manager.get_statistics::<Order>().cache_misses, 1);
    assert_eq!(manager.get_statistics::<Heartbeat>().cache_misses, 1);
    assert_eq!(manager.cached_types().len(), 1);
}

#[tokio::test]
async fn test_publish_statistics_reaches_sink() {
    let registry = CountingRegistry::new();
    let sink = Arc::new(RecordingSink::default());
    let manager = SerializerCacheManager::builder(registry)
        .sink(sink.clone())
        .build();

    manager.get_serializers::<Order>().await.unwrap();
    manager.get_serializers::<Order>().await.unwrap();
    manager.publish_statistics();

    let published = sink.statistics.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert!(published[0].0.ends_with("Order"));
    assert_eq!(published[0].1.cache_hits, 1);
    assert_eq!(published[0].1.cache_misses, 1);
}
