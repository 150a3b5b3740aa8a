//! Startup connectivity check
//!
//! The registry is a hard dependency: a process that cannot reach it at
//! startup should refuse to start. [`check_registry_connectivity`] probes the
//! registry a bounded number of times with exponential backoff and hands the
//! last failure back to the caller, which decides how to terminate.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use super::client::RegistryClient;
use super::error::{SchemaError, SchemaResult};

/// Connectivity probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Total probe attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff_ms: u64,
    /// Upper bound on the delay between attempts
    pub max_backoff_ms: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl StartupConfig {
    /// Single attempt, no waiting
    pub fn fail_fast() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("startup.max_attempts must be at least 1".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("startup.backoff_multiplier must be at least 1.0".to_string());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "startup.initial_backoff_ms ({}) cannot exceed max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        Ok(())
    }
}

/// Probe the registry until it answers or the attempts run out.
///
/// Returns the number of subjects the registry reported.
pub async fn check_registry_connectivity(
    client: &dyn RegistryClient,
    config: &StartupConfig,
) -> SchemaResult<usize> {
    let attempts = config.max_attempts.max(1);
    // Hand-built configs skip `validate`; never shrink or negate the delay
    let multiplier = config.backoff_multiplier.max(1.0);
    let mut delay = config.initial_backoff().min(config.max_backoff());
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            warn!(
                "Schema registry probe attempt {}/{} after {:?} delay",
                attempt, attempts, delay
            );
            sleep(delay).await;
            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * multiplier).min(config.max_backoff().as_secs_f64()),
            );
        }

        match client.list_subjects().await {
            Ok(subjects) => {
                info!(
                    "Schema registry reachable ({} subjects) after {} attempt(s)",
                    subjects.len(),
                    attempt
                );
                return Ok(subjects.len());
            }
            // Only transport failures are worth another attempt
            Err(e @ SchemaError::RegistryUnavailable { .. }) => {
                warn!("Schema registry probe failed: {}", e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SchemaError::unavailable("startup check", "no probe attempts were made")
    }))
}
