//! Schema Version Resolver
//!
//! Reconciles a locally generated schema with what the registry holds for
//! its subject. Resolution registers unregistered subjects and reuses
//! identical ones, but never registers over a different schema: that is
//! drift, and only an explicit upgrade may move a subject forward.
//!
//! The resolver keeps no state between calls and never retries.

use std::sync::Arc;

use super::client::RegistryClient;
use super::error::{SchemaError, SchemaResult};
use super::generator::SchemaGenerator;
use super::types::{EntityModel, Projection, Schema, SchemaIdentity, SubjectNameStrategy, UpgradeResult};

/// A generated schema together with the registry identity it is bound to
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSchema {
    pub schema: Schema,
    pub identity: SchemaIdentity,
}

pub struct SchemaVersionResolver {
    client: Arc<dyn RegistryClient>,
    generator: SchemaGenerator,
    strategy: SubjectNameStrategy,
}

impl SchemaVersionResolver {
    pub fn new(client: Arc<dyn RegistryClient>, strategy: SubjectNameStrategy) -> Self {
        Self {
            client,
            generator: SchemaGenerator::new(),
            strategy,
        }
    }

    pub fn client(&self) -> &Arc<dyn RegistryClient> {
        &self.client
    }

    pub fn strategy(&self) -> SubjectNameStrategy {
        self.strategy
    }

    pub fn subject(&self, model: &EntityModel, projection: Projection) -> String {
        self.strategy.subject(model, projection)
    }

    /// Identity of the registered schema matching the model's projection
    pub async fn resolve(
        &self,
        model: &EntityModel,
        projection: Projection,
    ) -> SchemaResult<SchemaIdentity> {
        Ok(self.resolve_bound(model, projection).await?.identity)
    }

    /// As [`resolve`](Self::resolve), also returning the generated schema
    pub async fn resolve_bound(
        &self,
        model: &EntityModel,
        projection: Projection,
    ) -> SchemaResult<BoundSchema> {
        let schema = self.generator.generate(model, projection)?;
        let subject = self.subject(model, projection);

        let identity = match self.client.fetch_latest(&subject).await {
            Ok(latest) if schema.same_definition(&latest.definition) => {
                log::debug!("Schema for {} matches {}", subject, latest.identity);
                latest.identity
            }
            Ok(latest) => {
                log::warn!(
                    "Generated schema for {} differs from registered {}",
                    subject,
                    latest.identity
                );
                return Err(SchemaError::SchemaDriftDetected {
                    subject,
                    registered: latest.identity,
                });
            }
            Err(SchemaError::SubjectNotFound { .. }) => {
                let identity = self.client.register(&subject, &schema).await?;
                log::info!("Registered new subject {}", identity);
                identity
            }
            Err(e) => return Err(e),
        };

        Ok(BoundSchema { schema, identity })
    }

    /// Move a subject forward to the model's current schema
    pub async fn upgrade(
        &self,
        model: &EntityModel,
        projection: Projection,
    ) -> SchemaResult<UpgradeResult> {
        Ok(self.upgrade_bound(model, projection).await?.0)
    }

    /// As [`upgrade`](Self::upgrade), also returning the bound schema
    pub async fn upgrade_bound(
        &self,
        model: &EntityModel,
        projection: Projection,
    ) -> SchemaResult<(UpgradeResult, BoundSchema)> {
        let schema = self.generator.generate(model, projection)?;
        let subject = self.subject(model, projection);

        let old_identity = match self.client.fetch_latest(&subject).await {
            Ok(latest) => Some(latest.identity),
            Err(SchemaError::SubjectNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        if old_identity.is_some() {
            let verdict = self.client.check_compatibility(&subject, &schema).await?;
            if !verdict.is_compatible {
                return Err(SchemaError::IncompatibleSchemaEvolution {
                    subject,
                    category: verdict
                        .category
                        .unwrap_or_else(|| "INCOMPATIBLE".to_string()),
                    messages: verdict.messages,
                });
            }
        }

        let new_identity = self.client.register(&subject, &schema).await?;
        match &old_identity {
            Some(old) if old.id != new_identity.id => {
                log::info!("Upgraded {} from {} to {}", subject, old, new_identity)
            }
            Some(_) => log::debug!("Upgrade of {} left schema unchanged", subject),
            None => log::info!("Registered new subject {}", new_identity),
        }

        let result = UpgradeResult {
            success: true,
            old_identity,
            new_identity: new_identity.clone(),
        };
        Ok((
            result,
            BoundSchema {
                schema,
                identity: new_identity,
            },
        ))
    }
}
