//! Per-type serializer statistics
//!
//! Counters are plain atomics updated with `Ordering::Relaxed`; a snapshot
//! is not a consistent cut across counters, only each counter is exact.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for one entity type (thread-safe)
#[derive(Debug, Default)]
pub struct CacheStatistics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_encodes: AtomicU64,
    total_decodes: AtomicU64,

    // Latency tracking (nanoseconds)
    total_latency_nanos: AtomicU64,
    latency_sample_count: AtomicU64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one encode and how long it took
    pub fn record_encode(&self, latency: Duration) {
        self.total_encodes.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    /// Record one decode and how long it took
    pub fn record_decode(&self, latency: Duration) {
        self.total_decodes.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.total_latency_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.latency_sample_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Statistics {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let samples = self.latency_sample_count.load(Ordering::Relaxed);

        Statistics {
            total_encodes: self.total_encodes.load(Ordering::Relaxed),
            total_decodes: self.total_decodes.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
            average_latency: if samples == 0 {
                Duration::ZERO
            } else {
                Duration::from_nanos(self.total_latency_nanos.load(Ordering::Relaxed) / samples)
            },
        }
    }
}

/// Point-in-time copy of a type's counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total_encodes: u64,
    pub total_decodes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `cache_hits / (cache_hits + cache_misses)`, 0.0 before any lookup
    pub hit_rate: f64,
    /// Mean encode/decode latency
    pub average_latency: Duration,
}
