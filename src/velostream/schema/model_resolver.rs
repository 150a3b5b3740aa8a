//! Entity Model Resolver
//!
//! Turns an entity's declared metadata into an [`EntityModel`], applying the
//! configured [`ValidationMode`]. Models are memoized per type for the
//! lifetime of the resolver; schema-affecting metadata is static per type.

use super::error::{SchemaError, SchemaResult};
use super::metadata::{DecimalPrecision, Entity, EntityDescriptor, SemanticType};
use super::types::{EntityModel, FieldModel, TypeIdentity, ValidationMode};
use crate::velostream::observability::{ResolutionWarning, Substitution, TelemetrySink};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Precision used for decimal fields without a hint in relaxed mode
pub const DEFAULT_DECIMAL_PRECISION: DecimalPrecision = DecimalPrecision {
    precision: 38,
    scale: 9,
};

pub struct EntityModelResolver {
    mode: ValidationMode,
    sink: Arc<dyn TelemetrySink>,
    models: RwLock<HashMap<TypeId, Arc<EntityModel>>>,
}

impl EntityModelResolver {
    pub fn new(mode: ValidationMode, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            mode,
            sink,
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Resolve the model for an entity type
    pub fn resolve<T: Entity>(&self) -> SchemaResult<Arc<EntityModel>> {
        let identity = TypeIdentity::of::<T>();
        if let Some(model) = self.cached(&identity) {
            return Ok(model);
        }
        self.resolve_descriptor(identity, T::descriptor())
    }

    /// Resolve a model from an explicit descriptor registered under `identity`
    pub fn resolve_descriptor(
        &self,
        identity: TypeIdentity,
        descriptor: EntityDescriptor,
    ) -> SchemaResult<Arc<EntityModel>> {
        if let Some(model) = self.cached(&identity) {
            return Ok(model);
        }

        let (model, warnings) = self.build(identity, descriptor)?;
        let model = Arc::new(model);

        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = models.get(&identity.id) {
            // Another caller resolved the same type first; its warnings already went out
            return Ok(existing.clone());
        }
        models.insert(identity.id, model.clone());
        drop(models);

        for warning in &warnings {
            self.sink.warning(warning);
        }
        log::debug!(
            "Resolved entity model for {} ({} fields, {} key fields)",
            identity,
            model.fields.len(),
            model.key_fields.len()
        );
        Ok(model)
    }

    /// Number of memoized models
    pub fn cached_models(&self) -> usize {
        self.models.read().map(|m| m.len()).unwrap_or(0)
    }

    fn cached(&self, identity: &TypeIdentity) -> Option<Arc<EntityModel>> {
        self.models
            .read()
            .ok()
            .and_then(|models| models.get(&identity.id).cloned())
    }

    fn build(
        &self,
        identity: TypeIdentity,
        descriptor: EntityDescriptor,
    ) -> SchemaResult<(EntityModel, Vec<ResolutionWarning>)> {
        let type_name = descriptor.name.clone();
        validate_structure(&descriptor)?;

        let mut missing = Vec::new();
        let mut substitutions = Vec::new();
        let mut deprecated = Vec::new();

        // Key designation
        let mut key_fields: Vec<usize> = descriptor
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.key)
            .map(|(i, _)| i)
            .collect();
        if !descriptor.has_key_designation() {
            missing.push("key designation".to_string());
            if let Some((index, field)) = descriptor
                .fields
                .iter()
                .enumerate()
                .find(|(_, f)| !f.ignore)
            {
                key_fields.push(index);
                substitutions.push(Substitution {
                    requirement: "key".to_string(),
                    value: field.name.clone(),
                });
            }
        }

        // Topic designation
        let subject_base = match &descriptor.topic {
            Some(topic) => topic.clone(),
            None => {
                missing.push("topic designation".to_string());
                substitutions.push(Substitution {
                    requirement: "topic".to_string(),
                    value: descriptor.name.clone(),
                });
                descriptor.name.clone()
            }
        };

        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for field in descriptor.fields {
            let mut precision = field.precision;
            if field.semantic_type == SemanticType::Decimal && !field.ignore {
                match precision {
                    Some(p) if p.precision == 0 || p.scale > p.precision => {
                        return Err(SchemaError::invalid_metadata(
                            &type_name,
                            format!("field '{}' declares invalid {}", field.name, p),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        missing.push(format!("precision for decimal field '{}'", field.name));
                        substitutions.push(Substitution {
                            requirement: format!("precision of '{}'", field.name),
                            value: DEFAULT_DECIMAL_PRECISION.to_string(),
                        });
                        precision = Some(DEFAULT_DECIMAL_PRECISION);
                    }
                }
            }

            if field.semantic_type == SemanticType::LocalTimestamp && !field.ignore {
                deprecated.push(field.name.clone());
            }

            fields.push(FieldModel {
                name: field.name,
                semantic_type: field.semantic_type,
                nullable: field.nullable,
                precision,
                format: field.format,
                max_length: field.max_length,
                ignored: field.ignore,
            });
        }

        let mut warnings = Vec::new();
        if missing.is_empty() {
            warnings.extend(deprecated.into_iter().map(|field| {
                ResolutionWarning::DeprecatedTemporal {
                    type_name: type_name.clone(),
                    field,
                }
            }));
        } else {
            match self.mode {
                ValidationMode::Strict => {
                    return Err(SchemaError::MissingRequiredMetadata {
                        type_name,
                        requirements: missing,
                    });
                }
                // One warning per resolution; deprecations ride along
                ValidationMode::Relaxed => {
                    warnings.push(ResolutionWarning::DefaultsSubstituted {
                        type_name: type_name.clone(),
                        substitutions,
                        deprecated_fields: deprecated,
                    });
                }
            }
        }

        let model = EntityModel {
            type_identity: identity,
            record_name: type_name,
            namespace: descriptor.namespace,
            subject_base,
            fields,
            key_fields,
        };
        Ok((model, warnings))
    }
}

/// Structural checks that apply in every validation mode
fn validate_structure(descriptor: &EntityDescriptor) -> SchemaResult<()> {
    let type_name = &descriptor.name;

    if !is_valid_name(type_name) {
        return Err(SchemaError::invalid_metadata(
            type_name,
            "record name must match [A-Za-z_][A-Za-z0-9_]*",
        ));
    }

    let mut seen = HashSet::new();
    for field in &descriptor.fields {
        if !is_valid_name(&field.name) {
            return Err(SchemaError::invalid_metadata(
                type_name,
                format!("field name '{}' is not a valid identifier", field.name),
            ));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::invalid_metadata(
                type_name,
                format!("duplicate field '{}'", field.name),
            ));
        }
        if field.key && field.ignore {
            return Err(SchemaError::invalid_metadata(
                type_name,
                format!("key field '{}' is marked ignore", field.name),
            ));
        }
    }

    if descriptor.keyless && descriptor.fields.iter().any(|f| f.key) {
        return Err(SchemaError::invalid_metadata(
            type_name,
            "declared keyless but marks key fields",
        ));
    }

    if descriptor.fields.iter().all(|f| f.ignore) {
        return Err(SchemaError::invalid_metadata(
            type_name,
            "no fields remain after ignored fields are removed",
        ));
    }

    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
