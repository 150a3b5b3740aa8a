use crate::unit::common::*;

async fn subjects_for(strategy: SubjectNameStrategy) -> Vec<String> {
    let registry = CountingRegistry::new();
    let manager = SerializerCacheManager::builder(registry.clone())
        .subject_strategy(strategy)
        .build();
    manager.get_serializers::<Order>().await.unwrap();
    registry.inner.list_subjects().await.unwrap()
}

#[tokio::test]
async fn test_topic_name_strategy() {
    assert_eq!(
        subjects_for(SubjectNameStrategy::TopicName).await,
        vec!["orders-key", "orders-value"]
    );
}

#[tokio::test]
async fn test_record_name_strategy() {
    assert_eq!(
        subjects_for(SubjectNameStrategy::RecordName).await,
        vec!["com.example.orders.Order", "com.example.orders.OrderKey"]
    );
}

#[tokio::test]
async fn test_topic_record_name_strategy() {
    assert_eq!(
        subjects_for(SubjectNameStrategy::TopicRecordName).await,
        vec![
            "orders-com.example.orders.Order",
            "orders-com.example.orders.OrderKey"
        ]
    );
}

#[tokio::test]
async fn test_identical_schemas_share_ids_across_subjects() {
    let registry = CountingRegistry::new();
    let topic_manager = manager_with(registry.clone());
    let record_manager = SerializerCacheManager::builder(registry.clone())
        .subject_strategy(SubjectNameStrategy::RecordName)
        .build();

    let by_topic = topic_manager.get_serializers::<Order>().await.unwrap();
    let by_record = record_manager.get_serializers::<Order>().await.unwrap();

    assert_ne!(by_topic.value_identity.subject, by_record.value_identity.subject);
    assert_eq!(by_topic.value_identity.id, by_record.value_identity.id);
}
