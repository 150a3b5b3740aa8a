//! Schema Registry Client Implementation
//!
//! [`RegistryClient`] is the RPC boundary to the external schema registry.
//! [`HttpRegistryClient`] speaks the Confluent Schema Registry REST API.
//!
//! Clients never retry: a transport failure is reported once as
//! [`SchemaError::RegistryUnavailable`] and retry policy belongs to the caller.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::velostream::schema::types::{
    CompatibilityVerdict, RegisteredSchema, Schema, SchemaIdentity,
};
use crate::velostream::schema::{SchemaError, SchemaResult};

/// Remote schema registry operations used by the engine
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Register `schema` under `subject`. Registering identical content again
    /// returns the existing identity; that guarantee is the registry's.
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<SchemaIdentity>;

    /// Latest registered schema for `subject`
    async fn fetch_latest(&self, subject: &str) -> SchemaResult<RegisteredSchema>;

    /// Ask the registry whether `schema` may be registered under `subject`
    async fn check_compatibility(
        &self,
        subject: &str,
        schema: &Schema,
    ) -> SchemaResult<CompatibilityVerdict>;

    async fn check_compatible(&self, subject: &str, schema: &Schema) -> SchemaResult<bool> {
        Ok(self.check_compatibility(subject, schema).await?.is_compatible)
    }

    /// All subjects known to the registry
    async fn list_subjects(&self) -> SchemaResult<Vec<String>>;
}

/// Authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// Confluent Schema Registry error body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_code: Option<i64>,
    message: Option<String>,
}

/// API response for `POST /subjects/{subject}/versions`
#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

/// API response for subject version lookups
#[derive(Debug, Deserialize)]
struct SubjectVersionResponse {
    subject: String,
    version: i32,
    id: u32,
    schema: String,
}

/// API response for compatibility checks
#[derive(Debug, Deserialize)]
struct CompatibilityResponse {
    is_compatible: bool,
    #[serde(default)]
    messages: Vec<String>,
}

/// API request carrying a schema
#[derive(Debug, Serialize)]
struct SchemaRequest<'a> {
    schema: &'a str,
}

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Schema Registry HTTP client
pub struct HttpRegistryClient {
    base_url: String,
    auth: AuthConfig,
    http_client: Client,
    timeout: Duration,
}

impl HttpRegistryClient {
    /// Create a new Schema Registry client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: AuthConfig::None,
            http_client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set authentication configuration
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Per-request timeout; an expired request counts as a transport failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute_request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<String>,
        operation: &str,
    ) -> SchemaResult<Response> {
        let mut request = self
            .http_client
            .request(method, url)
            .header("Content-Type", CONTENT_TYPE)
            .header("Accept", CONTENT_TYPE)
            .timeout(self.timeout);

        request = match &self.auth {
            AuthConfig::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            AuthConfig::Bearer { token } => request.bearer_auth(token),
            AuthConfig::None => request,
        };

        if let Some(body) = body {
            request = request.body(body);
        }

        log::debug!("Schema registry {} -> {}", operation, url);

        let response = request
            .send()
            .await
            .map_err(|e| SchemaError::unavailable(operation, format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_error(operation, status, &body))
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
        operation: &str,
    ) -> SchemaResult<T> {
        response.json::<T>().await.map_err(|e| {
            SchemaError::unavailable(operation, format!("Failed to parse response: {}", e))
        })
    }

    fn schema_body(schema: &Schema, operation: &str) -> SchemaResult<String> {
        serde_json::to_string(&SchemaRequest {
            schema: &schema.definition,
        })
        .map_err(|e| SchemaError::InvalidSchema {
            subject: operation.to_string(),
            message: format!("Failed to serialize request: {}", e),
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<SchemaIdentity> {
        let operation = format!("register {}", subject);
        let body = Self::schema_body(schema, &operation)?;

        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let response = self
            .execute_request(reqwest::Method::POST, &url, Some(body.clone()), &operation)
            .await?;
        let registered: RegisterResponse = Self::parse(response, &operation).await?;

        // The register endpoint only returns the id; the lookup endpoint adds the version
        let url = format!("{}/subjects/{}", self.base_url, subject);
        let response = self
            .execute_request(reqwest::Method::POST, &url, Some(body), &operation)
            .await
            .map_err(|e| not_found_as_subject(e, subject))?;
        let version: SubjectVersionResponse = Self::parse(response, &operation).await?;

        if version.id != registered.id {
            log::warn!(
                "Registry returned id {} on register but {} on lookup for {}",
                registered.id,
                version.id,
                subject
            );
        }

        Ok(SchemaIdentity {
            subject: version.subject,
            id: registered.id,
            version: version.version,
        })
    }

    async fn fetch_latest(&self, subject: &str) -> SchemaResult<RegisteredSchema> {
        let operation = format!("fetch latest {}", subject);
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        let response = self
            .execute_request(reqwest::Method::GET, &url, None, &operation)
            .await
            .map_err(|e| not_found_as_subject(e, subject))?;

        let version: SubjectVersionResponse = Self::parse(response, &operation).await?;
        Ok(RegisteredSchema {
            identity: SchemaIdentity {
                subject: version.subject,
                id: version.id,
                version: version.version,
            },
            definition: version.schema,
        })
    }

    async fn check_compatibility(
        &self,
        subject: &str,
        schema: &Schema,
    ) -> SchemaResult<CompatibilityVerdict> {
        let operation = format!("check compatibility {}", subject);
        let body = Self::schema_body(schema, &operation)?;
        let url = format!(
            "{}/compatibility/subjects/{}/versions/latest?verbose=true",
            self.base_url, subject
        );

        let response = self
            .execute_request(reqwest::Method::POST, &url, Some(body), &operation)
            .await
            .map_err(|e| not_found_as_subject(e, subject))?;
        let result: CompatibilityResponse = Self::parse(response, &operation).await?;

        if result.is_compatible {
            Ok(CompatibilityVerdict::compatible())
        } else {
            let category = incompatibility_category(&result.messages);
            Ok(CompatibilityVerdict::incompatible(category, result.messages))
        }
    }

    async fn list_subjects(&self) -> SchemaResult<Vec<String>> {
        let url = format!("{}/subjects", self.base_url);
        let response = self
            .execute_request(reqwest::Method::GET, &url, None, "list subjects")
            .await?;
        Self::parse(response, "list subjects").await
    }
}

/// Map a non-success registry response to the engine's error taxonomy
fn classify_error(operation: &str, status: StatusCode, body: &str) -> SchemaError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| body.to_string());

    if status.is_server_error() {
        return SchemaError::unavailable(
            operation,
            format!("Request failed with status {}: {}", status, message),
        );
    }

    let error_code = parsed.and_then(|e| e.error_code).unwrap_or_default();
    if status == StatusCode::NOT_FOUND && error_code == 40401 {
        return SchemaError::SubjectNotFound {
            subject: String::new(),
        };
    }

    SchemaError::RegistryRejected {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    }
}

fn not_found_as_subject(err: SchemaError, subject: &str) -> SchemaError {
    match err {
        SchemaError::SubjectNotFound { .. } => SchemaError::SubjectNotFound {
            subject: subject.to_string(),
        },
        other => other,
    }
}

/// Pull the Avro compatibility error type out of verbose registry messages,
/// e.g. `{errorType:'READER_FIELD_MISSING_DEFAULT_VALUE', description:...}`
fn incompatibility_category(messages: &[String]) -> String {
    messages
        .iter()
        .find_map(|m| {
            let start = m.find("errorType:'")? + "errorType:'".len();
            let end = m[start..].find('\'')?;
            Some(m[start..start + end].to_string())
        })
        .unwrap_or_else(|| "INCOMPATIBLE".to_string())
}
