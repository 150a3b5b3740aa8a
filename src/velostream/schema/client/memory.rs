//! In-Memory Schema Registry
//!
//! Registry client that keeps everything in process memory. Suitable for
//! tests and development; behaves like the Confluent registry for the
//! operations the engine uses, including global ids, idempotent
//! registration and compatibility enforcement on register.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use super::registry_client::RegistryClient;
use crate::velostream::schema::evolution::{CompatibilityLevel, SchemaEvolution};
use crate::velostream::schema::types::{
    CompatibilityVerdict, RegisteredSchema, Schema, SchemaIdentity,
};
use crate::velostream::schema::{SchemaError, SchemaResult};

/// Schema version for in-memory storage
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    pub id: u32,
    pub version: i32,
    pub schema: String,
}

/// In-memory registry client for testing
pub struct InMemoryRegistryClient {
    /// Storage: subject -> versions, oldest first
    subjects: RwLock<HashMap<String, Vec<SchemaVersion>>>,
    /// Next schema ID to allocate
    next_id: AtomicU32,
    evolution: RwLock<SchemaEvolution>,
    available: AtomicBool,
}

impl Default for InMemoryRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistryClient {
    pub fn new() -> Self {
        Self::with_compatibility(CompatibilityLevel::default())
    }

    pub fn with_compatibility(level: CompatibilityLevel) -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            evolution: RwLock::new(SchemaEvolution::new(level)),
            available: AtomicBool::new(true),
        }
    }

    /// Change the compatibility level applied to every subject
    pub fn set_compatibility(&self, level: CompatibilityLevel) -> SchemaResult<()> {
        let mut evolution = self.evolution.write().map_err(|_| lock_error("configure"))?;
        *evolution = SchemaEvolution::new(level);
        Ok(())
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`SchemaError::RegistryUnavailable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// All versions stored for a subject, oldest first
    pub fn versions(&self, subject: &str) -> Vec<SchemaVersion> {
        self.subjects
            .read()
            .map(|subjects| subjects.get(subject).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn ensure_available(&self, operation: &str) -> SchemaResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SchemaError::unavailable(operation, "registry is unavailable"))
        }
    }

    fn evolution(&self) -> SchemaResult<SchemaEvolution> {
        self.evolution
            .read()
            .map(|e| *e)
            .map_err(|_| lock_error("read compatibility"))
    }

    fn verdict(
        &self,
        versions: &[SchemaVersion],
        subject: &str,
        schema: &Schema,
    ) -> SchemaResult<CompatibilityVerdict> {
        let history: Vec<&str> = versions.iter().map(|v| v.schema.as_str()).collect();
        self.evolution()?
            .check(&history, &schema.definition)
            .map_err(|e| match e {
                SchemaError::InvalidSchema { message, .. } => SchemaError::InvalidSchema {
                    subject: subject.to_string(),
                    message,
                },
                other => other,
            })
    }
}

fn lock_error(operation: &str) -> SchemaError {
    SchemaError::unavailable(operation, "Failed to acquire registry lock")
}

#[async_trait]
impl RegistryClient for InMemoryRegistryClient {
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<SchemaIdentity> {
        let operation = format!("register {}", subject);
        self.ensure_available(&operation)?;

        let mut subjects = self.subjects.write().map_err(|_| lock_error(&operation))?;

        if let Some(existing) = subjects
            .get(subject)
            .and_then(|versions| versions.iter().find(|v| schema.same_definition(&v.schema)))
        {
            return Ok(SchemaIdentity {
                subject: subject.to_string(),
                id: existing.id,
                version: existing.version,
            });
        }

        let versions = subjects.get(subject).cloned().unwrap_or_default();
        let verdict = self.verdict(&versions, subject, schema)?;
        if !verdict.is_compatible {
            return Err(SchemaError::RegistryRejected {
                operation,
                status: 409,
                message: verdict.messages.join("; "),
            });
        }

        // Identical content keeps its global id across subjects
        let id = subjects
            .values()
            .flatten()
            .find(|v| schema.same_definition(&v.schema))
            .map(|v| v.id)
            .unwrap_or_else(|| self.next_id.fetch_add(1, Ordering::SeqCst));

        let entry = subjects.entry(subject.to_string()).or_default();
        let version = entry.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        entry.push(SchemaVersion {
            id,
            version,
            schema: schema.definition.clone(),
        });

        log::debug!("Registered {} as id {} version {}", subject, id, version);

        Ok(SchemaIdentity {
            subject: subject.to_string(),
            id,
            version,
        })
    }

    async fn fetch_latest(&self, subject: &str) -> SchemaResult<RegisteredSchema> {
        let operation = format!("fetch latest {}", subject);
        self.ensure_available(&operation)?;

        let subjects = self.subjects.read().map_err(|_| lock_error(&operation))?;
        let latest = subjects
            .get(subject)
            .and_then(|versions| versions.iter().max_by_key(|v| v.version))
            .ok_or_else(|| SchemaError::SubjectNotFound {
                subject: subject.to_string(),
            })?;

        Ok(RegisteredSchema {
            identity: SchemaIdentity {
                subject: subject.to_string(),
                id: latest.id,
                version: latest.version,
            },
            definition: latest.schema.clone(),
        })
    }

    async fn check_compatibility(
        &self,
        subject: &str,
        schema: &Schema,
    ) -> SchemaResult<CompatibilityVerdict> {
        let operation = format!("check compatibility {}", subject);
        self.ensure_available(&operation)?;

        let versions = {
            let subjects = self.subjects.read().map_err(|_| lock_error(&operation))?;
            subjects
                .get(subject)
                .cloned()
                .ok_or_else(|| SchemaError::SubjectNotFound {
                    subject: subject.to_string(),
                })?
        };
        self.verdict(&versions, subject, schema)
    }

    async fn list_subjects(&self) -> SchemaResult<Vec<String>> {
        self.ensure_available("list subjects")?;
        let subjects = self
            .subjects
            .read()
            .map_err(|_| lock_error("list subjects"))?;
        let mut names: Vec<String> = subjects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
