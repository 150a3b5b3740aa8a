use crate::unit::common::*;
use std::io::Write;
use std::time::Duration;
use velostream_schema::velostream::config::{ConfigError, SchemaEngineConfig};
use velostream_schema::velostream::schema::AuthConfig;

const ENGINE_YAML: &str = r#"
registry:
  url: "http://schema-registry:8081/"
  request_timeout_ms: 2500
  auth:
    type: basic
    username: svc
    password: secret
validation_mode: relaxed
subject_strategy: record_name
resolution_timeout_ms: 750
startup:
  max_attempts: 4
  initial_backoff_ms: 100
  max_backoff_ms: 800
"#;

#[test]
fn test_full_config_from_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ENGINE_YAML.as_bytes()).unwrap();

    let config = SchemaEngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.validation_mode, ValidationMode::Relaxed);
    assert_eq!(config.subject_strategy, SubjectNameStrategy::RecordName);
    assert_eq!(config.resolution_timeout(), Duration::from_millis(750));
    assert_eq!(config.registry.request_timeout(), Duration::from_millis(2500));
    assert_eq!(
        config.registry.auth,
        AuthConfig::Basic {
            username: "svc".to_string(),
            password: "secret".to_string(),
        }
    );
    assert_eq!(config.startup.max_attempts, 4);

    let client = config.registry_client();
    assert_eq!(client.base_url(), "http://schema-registry:8081");
}

#[tokio::test]
async fn test_config_drives_manager_behaviour() {
    let config = SchemaEngineConfig::from_yaml_str(ENGINE_YAML).unwrap();
    let registry = CountingRegistry::new();
    let manager = config.cache_manager_builder(registry.clone()).build();

    assert_eq!(manager.validation_mode(), ValidationMode::Relaxed);
    // Relaxed mode accepts the incomplete entity
    let pair = manager.get_serializers::<LegacyTrade>().await.unwrap();
    assert_eq!(pair.value_identity.subject, "LegacyTrade");
    assert_eq!(pair.key_identity.as_ref().unwrap().subject, "LegacyTradeKey");
}

#[test]
fn test_malformed_yaml() {
    let err = SchemaEngineConfig::from_yaml_str("registry: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
