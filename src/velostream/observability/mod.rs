//! Warning and telemetry sink.
//!
//! The engine never writes warnings or statistics anywhere itself; it hands
//! them to a caller-supplied [`TelemetrySink`]. [`LogSink`] forwards to the
//! `log` facade and is what most deployments want.

use crate::velostream::cache::Statistics;
use std::fmt;

/// A default value substituted by relaxed model resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// What was missing, e.g. `key` or `topic`
    pub requirement: String,
    /// The value used in its place
    pub value: String,
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.requirement, self.value)
    }
}

/// Warnings raised while resolving an entity model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// Relaxed mode replaced missing metadata with defaults. This is the
    /// only warning such a resolution emits: timezone-naive timestamp
    /// fields are listed in `deprecated_fields` instead of raising
    /// separate [`DeprecatedTemporal`](Self::DeprecatedTemporal) warnings.
    DefaultsSubstituted {
        type_name: String,
        substitutions: Vec<Substitution>,
        deprecated_fields: Vec<String>,
    },
    /// A field uses the deprecated timezone-naive timestamp representation.
    /// Raised in either mode when no defaults were substituted.
    DeprecatedTemporal { type_name: String, field: String },
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::DefaultsSubstituted {
                type_name,
                substitutions,
                deprecated_fields,
            } => {
                let listed: Vec<String> = substitutions.iter().map(|s| s.to_string()).collect();
                write!(
                    f,
                    "Entity '{}' is missing metadata, substituted defaults: {}",
                    type_name,
                    listed.join(", ")
                )?;
                if !deprecated_fields.is_empty() {
                    write!(
                        f,
                        "; timezone-naive timestamp fields: {}",
                        deprecated_fields.join(", ")
                    )?;
                }
                Ok(())
            }
            ResolutionWarning::DeprecatedTemporal { type_name, field } => write!(
                f,
                "Entity '{}' field '{}' uses a timezone-naive timestamp; declare it timezone-aware",
                type_name, field
            ),
        }
    }
}

/// Receiver for engine warnings and statistics snapshots
pub trait TelemetrySink: Send + Sync {
    fn warning(&self, warning: &ResolutionWarning);

    fn statistics(&self, _type_name: &str, _statistics: &Statistics) {}
}

/// Forwards everything to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn warning(&self, warning: &ResolutionWarning) {
        log::warn!("{}", warning);
    }

    fn statistics(&self, type_name: &str, statistics: &Statistics) {
        log::info!(
            "Serializer cache for {}: hits={} misses={} hit_rate={:.2} encodes={} decodes={} avg_latency={:?}",
            type_name,
            statistics.cache_hits,
            statistics.cache_misses,
            statistics.hit_rate,
            statistics.total_encodes,
            statistics.total_decodes,
            statistics.average_latency
        );
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn warning(&self, _warning: &ResolutionWarning) {}
}
